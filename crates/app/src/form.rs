//! Line-oriented terminal form over a `SurveySession`.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use services::{SessionError, SessionState, SurveySession};
use survey_core::model::{Question, RatingDraft, RatingField, RatingSlot};

use crate::download;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Save,
    Download,
    Rename,
    Quit,
}

impl Action {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "s" | "save" => Some(Self::Save),
            "d" | "download" => Some(Self::Download),
            "n" | "name" => Some(Self::Rename),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

pub struct Form<R, W> {
    input: R,
    output: W,
    download_dir: PathBuf,
}

impl<R: BufRead, W: Write> Form<R, W> {
    pub fn new(input: R, output: W, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            input,
            output,
            download_dir: download_dir.into(),
        }
    }

    /// Drive the session until the participant quits, finishes, or input ends.
    pub async fn run(&mut self, session: &mut SurveySession) -> io::Result<()> {
        writeln!(self.output, "LLM Answer Evaluation")?;
        writeln!(
            self.output,
            "Rate each model answer from 1 (poor) to 5 (excellent)."
        )?;

        loop {
            let flow = match session.state() {
                SessionState::NoName => self.ask_name(session).await?,
                SessionState::NameEntered => self.retry_load(session).await?,
                SessionState::InProgress { .. } => self.ask_question(session).await?,
                SessionState::Completed => {
                    self.finish(session).await?;
                    Flow::Quit
                }
            };
            if matches!(flow, Flow::Quit) {
                return Ok(());
            }
        }
    }

    async fn ask_name(&mut self, session: &mut SurveySession) -> io::Result<Flow> {
        let Some(name) = self.prompt("\nYour name: ")? else {
            return Ok(Flow::Quit);
        };
        if let Err(err) = session.enter_name(&name).await {
            writeln!(self.output, "Could not load your previous answers: {err}")?;
        }
        Ok(Flow::Continue)
    }

    async fn retry_load(&mut self, session: &mut SurveySession) -> io::Result<Flow> {
        let Some(answer) = self.prompt("[r]etry or [q]uit: ")? else {
            return Ok(Flow::Quit);
        };
        if answer.trim().eq_ignore_ascii_case("q") {
            return Ok(Flow::Quit);
        }
        if let Err(err) = session.refresh().await {
            writeln!(self.output, "Still unable to reach the results store: {err}")?;
        }
        Ok(Flow::Continue)
    }

    async fn ask_question(&mut self, session: &mut SurveySession) -> io::Result<Flow> {
        let Some(question) = session.current_question().cloned() else {
            return Ok(Flow::Continue);
        };
        self.show_question(session, &question)?;

        let Some(draft) = self.read_draft()? else {
            return Ok(Flow::Quit);
        };
        let Some(comment) = self.prompt("Comment (optional): ")? else {
            return Ok(Flow::Quit);
        };

        loop {
            let Some(raw) = self.prompt("[s]ave & next, [d]ownload my results, [n]ew name, [q]uit: ")?
            else {
                return Ok(Flow::Quit);
            };
            match Action::parse(&raw) {
                Some(Action::Save) => return self.save(session, &draft, &comment).await,
                Some(Action::Download) => self.download(session).await?,
                Some(Action::Rename) => {
                    session.clear_participant();
                    return Ok(Flow::Continue);
                }
                Some(Action::Quit) => return Ok(Flow::Quit),
                None => writeln!(self.output, "Unknown choice: {}", raw.trim())?,
            }
        }
    }

    fn show_question(&mut self, session: &SurveySession, question: &Question) -> io::Result<()> {
        let progress = session.progress();
        writeln!(self.output)?;
        writeln!(
            self.output,
            "Question {} of {}    (answered {} / {})",
            question.sequence_index, progress.total, progress.answered, progress.total
        )?;
        writeln!(self.output, "QID: {}", question.qid)?;
        writeln!(self.output, "Question:\n{}", question.question_text)?;
        writeln!(self.output, "Model answer:\n{}", question.model_answer)?;
        Ok(())
    }

    fn read_draft(&mut self) -> io::Result<Option<RatingDraft>> {
        let mut draft = RatingDraft::default();
        for field in RatingField::ALL {
            let label = format!("{} (1-5, blank for {}): ", field.label(), RatingSlot::UNSET_LABEL);
            loop {
                let Some(raw) = self.prompt(&label)? else {
                    return Ok(None);
                };
                match RatingSlot::parse_input(&raw) {
                    Ok(slot) => {
                        draft.set(field, slot);
                        break;
                    }
                    Err(err) => writeln!(self.output, "{err}")?,
                }
            }
        }
        Ok(Some(draft))
    }

    async fn save(
        &mut self,
        session: &mut SurveySession,
        draft: &RatingDraft,
        comment: &str,
    ) -> io::Result<Flow> {
        match session.submit(draft, comment).await {
            Ok(_) => writeln!(self.output, "Saved.")?,
            Err(SessionError::Validation(err)) => writeln!(self.output, "{err}")?,
            Err(err) => writeln!(
                self.output,
                "Could not save your response ({err}). Nothing was lost; please try again."
            )?,
        }
        Ok(Flow::Continue)
    }

    async fn finish(&mut self, session: &SurveySession) -> io::Result<()> {
        let name = session.participant().map_or("", |p| p.name());
        writeln!(self.output, "\nAll questions answered. Thank you, {name}!")?;
        if let Some(answer) = self.prompt("Download your results? [y/N]: ")? {
            if answer.trim().eq_ignore_ascii_case("y") {
                self.download(session).await?;
            }
        }
        Ok(())
    }

    async fn download(&mut self, session: &SurveySession) -> io::Result<()> {
        let Some(participant) = session.participant() else {
            return Ok(());
        };
        let csv = match session.export_csv().await {
            Ok(Some(csv)) => csv,
            Ok(None) => {
                writeln!(self.output, "Nothing recorded for you yet.")?;
                return Ok(());
            }
            Err(err) => {
                tracing::warn!(error = %err, "results export failed");
                writeln!(self.output, "Download is unavailable right now.")?;
                return Ok(());
            }
        };
        match download::write_results(&self.download_dir, participant.name(), &csv) {
            Ok(path) => writeln!(self.output, "Saved your results to {}", path.display())?,
            Err(err) => {
                tracing::warn!(error = %err, "writing results file failed");
                writeln!(self.output, "Download is unavailable right now.")?;
            }
        }
        Ok(())
    }

    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }
}
