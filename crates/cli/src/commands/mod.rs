pub mod corpus;
pub mod doctor;
pub mod migrate;

pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}
