use failure::{err_msg, Error};
use regex::{Captures, Regex};

pub const DEFAULT_LOG_FORMAT: &str = "$time_local \"$request\" $status $body_bytes_sent \
     \"$request_body\" \"$resp_body\" \"$req_headers\" \"$resp_headers\" $request_time";

pub const DEFAULT_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// An nginx `log_format` template compiled into an anchored regex.
///
/// Every `$variable` becomes a lazy named capture, everything else has to
/// match literally.
#[derive(Debug)]
pub struct LogFormat {
    regex: Regex,
    variables: Vec<String>,
}

impl LogFormat {
    pub fn new(template: &str) -> Result<LogFormat, Error> {
        let mut pattern = String::from("^");
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }

            let mut name = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }

            if name.is_empty() {
                literal.push(c);
                continue;
            }

            if variables.contains(&name) {
                return Err(err_msg(format!(
                    "log format uses ${} more than once",
                    name
                )));
            }

            pattern.push_str(&regex::escape(&literal));
            literal.clear();
            pattern.push_str(&format!("(?P<{}>.*?)", name));
            variables.push(name);
        }

        pattern.push_str(&regex::escape(&literal));
        pattern.push('$');

        if !variables.iter().any(|v| v == "time_local" || v == "msec") {
            return Err(err_msg("log format needs $time_local or $msec"));
        }

        for required in &["request", "status"] {
            if !variables.iter().any(|v| v == required) {
                return Err(err_msg(format!("log format needs ${}", required)));
            }
        }

        let regex = Regex::new(&pattern)
            .map_err(|err| err_msg(format!("invalid log format ({})", err)))?;

        Ok(LogFormat { regex, variables })
    }

    pub fn captures<'t>(&self, line: &'t str) -> Option<Captures<'t>> {
        self.regex.captures(line)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format() {
        let format = LogFormat::new(DEFAULT_LOG_FORMAT).unwrap();

        let line = "10/Oct/2023:13:55:36 +0000 \"GET /a?b=1 HTTP/1.1\" 200 2 \"-\" \"{}\" \"{}\" \"{}\" 0.004";
        let captures = format.captures(line).unwrap();

        assert_eq!(&captures["time_local"], "10/Oct/2023:13:55:36 +0000");
        assert_eq!(&captures["request"], "GET /a?b=1 HTTP/1.1");
        assert_eq!(&captures["status"], "200");
        assert_eq!(&captures["request_body"], "-");
        assert_eq!(&captures["request_time"], "0.004");
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        let format = LogFormat::new("[$time_local] $request ($status)").unwrap();

        let captures = format
            .captures("[10/Oct/2023:13:55:36 +0000] GET / HTTP/1.1 (404)")
            .unwrap();

        assert_eq!(&captures["status"], "404");
        assert!(format.captures("10/Oct/2023 GET / HTTP/1.1 404").is_none());
    }

    #[test]
    fn test_missing_required_variable() {
        let error_message = match LogFormat::new("$time_local $status") {
            Err(fail) => format!("{}", fail),
            Ok(_) => unreachable!(),
        };

        assert!(error_message.contains("$request"));
    }

    #[test]
    fn test_duplicate_variable() {
        assert!(LogFormat::new("$time_local $request $status $status").is_err());
    }

    #[test]
    fn test_has_variable() {
        let format = LogFormat::new("$msec \"$request\" $status").unwrap();

        assert!(format.has_variable("msec"));
        assert!(!format.has_variable("time_local"));
    }
}
