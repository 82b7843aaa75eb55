mod commands;
mod parse;

pub(crate) use commands::{finish, run};
pub(crate) use parse::{parse_args, usage, Invocation};
