//! GRBL Response Parser
//!
//! Classifies single lines received from a GRBL controller. Classification
//! is pure: the same line always yields the same response.

use std::fmt;

/// GRBL response types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// OK acknowledgment
    Ok,
    /// `error...` acknowledgment; payload is the text after `error` and `:`
    ControllerError { payload: String },
    /// Bracketed status frame, e.g. `<Idle|MPos:0.000,0.000,0.000>`
    StatusReport { raw: String },
    /// Setting line `$key=value`
    SettingLine { key: String, value: String },
    /// Informational text (welcome banner, build info, alarms, feedback)
    Unrecognized { raw: String },
}

impl Response {
    /// Whether this line acknowledges a command (`ok` or `error`)
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ok | Self::ControllerError { .. })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::ControllerError { payload } => write!(f, "error:{}", payload),
            Self::StatusReport { raw } => write!(f, "{}", raw),
            Self::SettingLine { key, value } => write!(f, "${}={}", key, value),
            Self::Unrecognized { raw } => write!(f, "{}", raw),
        }
    }
}

/// Classify a received line
pub fn classify(line: &str) -> Response {
    let line = line.trim();

    if line.starts_with("ok") {
        return Response::Ok;
    }

    if let Some(rest) = line.strip_prefix("error") {
        let payload = rest.strip_prefix(':').unwrap_or(rest).trim();
        return Response::ControllerError {
            payload: payload.to_string(),
        };
    }

    if line.starts_with('<') && line.ends_with('>') {
        return Response::StatusReport {
            raw: line.to_string(),
        };
    }

    if let Some(setting) = line.strip_prefix('$') {
        if let Some((key, value)) = setting.split_once('=') {
            return Response::SettingLine {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            };
        }
    }

    Response::Unrecognized {
        raw: line.to_string(),
    }
}

/// Machine state of a status frame (`Idle`, `Run`, `Hold:0`, ...)
pub fn status_state(raw: &str) -> &str {
    let inner = raw.trim().trim_start_matches('<').trim_end_matches('>');
    inner.split('|').next().unwrap_or_default()
}
