use std::fs::File;
use std::io;
use std::io::BufRead;
use std::path::Path;

use failure::{err_msg, Error};
use flate2::read::MultiGzDecoder;

pub mod log_events;
pub mod log_format;

use self::log_events::AccessLogRecord;
use self::log_format::LogFormat;

/// Opens the access log, transparently decompressing rotated `.gz` files.
pub fn open_logfile(filename: &str) -> Result<Box<dyn BufRead>, Error> {
    let path = Path::new(filename);

    if !path.is_file() {
        return Err(err_msg(format!("Log file {} does not exist", filename)));
    }

    let file = File::open(path)?;

    if filename.ends_with(".gz") {
        Ok(Box::new(io::BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(io::BufReader::new(file)))
    }
}

/// Lazily turns log lines into records. Lines that can not be read or parsed
/// are skipped with a warning.
pub fn parse<'a, R>(
    input: R,
    format: &'a LogFormat,
    time_format: &'a str,
) -> impl Iterator<Item = AccessLogRecord> + 'a
where
    R: BufRead + 'a,
{
    input
        .lines()
        .enumerate()
        .filter_map(move |(index, line)| {
            let line_value = match line {
                Ok(line_value) => line_value,
                Err(err) => {
                    warn!("Skipped line {}: {}", index + 1, err);
                    return None;
                }
            };

            if line_value.trim().is_empty() {
                return None;
            }

            match AccessLogRecord::new_from_log_line(&line_value, format, time_format) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!("Skipped line {}: {}", index + 1, err);
                    None
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::log_format::{DEFAULT_LOG_FORMAT, DEFAULT_TIME_FORMAT};
    use super::*;

    fn parse_file(filename: &str) -> Vec<AccessLogRecord> {
        let format = LogFormat::new(DEFAULT_LOG_FORMAT).unwrap();
        let input = open_logfile(filename).unwrap();

        parse(input, &format, DEFAULT_TIME_FORMAT).collect()
    }

    #[test]
    fn test_parse_simple() {
        let records = parse_file("src/test/replay.log");

        assert_eq!(records.len(), 6);
        assert_eq!(records[0].path, "/api/items?page=1");
        assert_eq!(records[5].status, "500");
    }

    #[test]
    fn test_parse_ignore_broken_lines() {
        let records = parse_file("src/test/broken.log");

        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_keeps_file_order() {
        let records = parse_file("src/test/replay.log");

        let timestamps: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort();

        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn test_open_missing_file() {
        let error_message = match open_logfile("src/test/does-not-exist.log") {
            Err(fail) => format!("{}", fail),
            Ok(_) => unreachable!(),
        };

        assert!(error_message.contains("does not exist"));
    }

    #[test]
    fn test_open_gzipped_file() {
        let plain = std::fs::read("src/test/replay.log").unwrap();
        let path = std::env::temp_dir().join("access_log_replayer_test_open.log.gz");

        {
            let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
            encoder.write_all(&plain).unwrap();
            encoder.finish().unwrap();
        }

        let records = parse_file(path.to_str().unwrap());

        assert_eq!(records.len(), 6);
        let _ = std::fs::remove_file(&path);
    }
}
