#[derive(Debug)]
pub enum Error {
    IOError(std::io::Error),
    TOMLParseError(toml::de::Error),
    JSONError(serde_json::Error),
    BadLogLevel(String),
    BadInputBinding(String),
    Pipeline(judge_pipeline::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IOError(e) => {
                write!(f, "input/output error: {}", e)
            }
            Self::TOMLParseError(e) => {
                write!(f, "error parsing TOML: {}", e)
            }
            Self::JSONError(e) => {
                write!(f, "error encoding JSON: {}", e)
            }
            Self::BadLogLevel(e) => {
                write!(f, "invalid log level {}", e)
            }
            Self::BadInputBinding(s) => {
                write!(f, "invalid input binding {}, expected name=path", s)
            }
            Self::Pipeline(e) => {
                write!(f, "pipeline error: {}", e)
            }
        }
    }
}

impl std::error::Error for Error {}
