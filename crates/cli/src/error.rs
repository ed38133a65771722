use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    /// The command acts on behalf of a user but `--as` was not given.
    #[error("This command needs a user; pass --as <USER_ID>")]
    MissingUser,

    #[error("Unknown media kind {kind}; expected image or video")]
    InvalidMediaKind { kind: String },
}
