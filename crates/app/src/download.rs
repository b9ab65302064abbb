use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// `results_<name>.csv`, with characters unsafe in file names replaced.
#[must_use]
pub fn results_file_name(participant: &str) -> String {
    let safe: String = participant
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("results_{safe}.csv")
}

/// Write the participant's export into `dir`, returning the file path.
pub fn write_results(dir: &Path, participant: &str, csv: &str) -> io::Result<PathBuf> {
    let path = dir.join(results_file_name(participant));
    fs::write(&path, csv)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_keeps_plain_names() {
        assert_eq!(results_file_name(" Alice Smith "), "results_Alice Smith.csv");
    }

    #[test]
    fn file_name_strips_path_separators() {
        assert_eq!(results_file_name("../etc/x"), "results_.._etc_x.csv");
    }

    #[test]
    fn writes_into_the_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_results(dir.path(), "bob", "a,b\n1,2\n").unwrap();
        assert_eq!(path, dir.path().join("results_bob.csv"));
        assert_eq!(fs::read_to_string(path).unwrap(), "a,b\n1,2\n");
    }
}
