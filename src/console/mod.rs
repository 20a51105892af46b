// Table and text rendering
mod display;

// Interactive loop
mod repl;

// One handler per console command, shared with the one-shot subcommands
pub mod commands;

pub use commands::ConsoleContext;
pub use repl::console_loop;
