// ABOUTME: Constants and defaults for the REPL host

pub const VERSION: &str = "1.0.0";

pub const WELCOME_MESSAGE: &str = "Formulet is a tool for evaluating formulas.";
pub const WELCOME_SUBTITLE: &str = "Type 'info' for additional information.";
pub const WELCOME_FOOTER: &str = "Type 'exit' to quit.";

/// Workspace size (tokens) for each compile and each evaluation.
pub const DEFAULT_STACK_SIZE: usize = 1024;

pub const HISTORY_FILE: &str = ".formulet_history";

pub const INFO_TEXT: &str = "  exit        : Quit program
  identifiers : List identifiers
  info        : Display this information
  ${<num>}    : Variable corresponding to line <num>
  $<name>     : Variable loaded from the --vars file
  # ...       : Comment line, ignored";
