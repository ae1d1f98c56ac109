pub type ExpResult<T> = Result<T, ExpError>;

#[derive(thiserror::Error, Debug)]
pub enum ExpError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("tree error: {0}")]
    Tree(String),

    #[error("animation error: {0}")]
    Animation(String),

    #[error("director error: {0}")]
    Director(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExpError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn tree(msg: impl Into<String>) -> Self {
        Self::Tree(msg.into())
    }

    pub fn animation(msg: impl Into<String>) -> Self {
        Self::Animation(msg.into())
    }

    pub fn director(msg: impl Into<String>) -> Self {
        Self::Director(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for ExpError {
    fn from(err: serde_json::Error) -> Self {
        Self::serde(err.to_string())
    }
}

/// Fail-fast contract check used by constructors and `finalize`.
pub fn ensure(cond: bool, msg: impl Into<String>) -> ExpResult<()> {
    if cond {
        Ok(())
    } else {
        Err(ExpError::validation(msg))
    }
}
