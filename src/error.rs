pub type DotsResult<T> = Result<T, DotsError>;

#[derive(thiserror::Error, Debug)]
pub enum DotsError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(String),

    #[error("dom error: {0}")]
    Dom(String),
}

impl DotsError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    pub fn dom(msg: impl Into<String>) -> Self {
        Self::Dom(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            DotsError::invalid_config("x")
                .to_string()
                .contains("invalid config:")
        );
        assert!(DotsError::image("x").to_string().contains("image error:"));
        assert!(DotsError::dom("x").to_string().contains("dom error:"));
    }

    #[test]
    fn json_errors_convert() {
        let err: DotsError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, DotsError::Json(_)));
    }
}
