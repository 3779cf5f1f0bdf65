use thiserror::Error;

#[derive(Debug, Error)]
pub enum AscentError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("unknown trait: {0}")]
    UnknownTrait(String),

    #[error("development plan not found: {0}")]
    PlanNotFound(String),

    #[error("no chosen {kind} trait for plan {plan_id}")]
    ChosenTraitMissing { kind: String, plan_id: String },

    #[error("sprint {0} not found")]
    SprintNotFound(u32),

    #[error("sprint {0} is already finished")]
    SprintAlreadyFinished(u32),

    #[error("form not found: {0}")]
    FormNotFound(String),

    #[error("pending action not found: {0}")]
    PendingActionNotFound(String),

    #[error("invalid answer set: {0}")]
    InvalidAnswers(String),

    #[error("unknown extent: {0}")]
    UnknownExtent(String),

    #[error("invalid trait kind: {0}")]
    InvalidTraitKind(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("chosen traits changed concurrently for plan {0}")]
    SelectionConflict(String),

    #[error("plan {0} has no dates set")]
    PlanDatesMissing(String),

    #[error("nudge store error: {0}")]
    NudgeDb(String),

    #[error("planner service error: {0}")]
    Planner(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AscentError>;
