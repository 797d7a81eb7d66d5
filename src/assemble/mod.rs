pub mod command;
pub mod merge;
pub mod redirect;

pub use command::create_command;
pub use merge::{FragmentMerger, MergeOptions, MergedArgument, merge};
pub use redirect::{Redirect, RedirectChain, Target};

use log::debug;

use crate::error::BuildError;
use crate::parse::ParsedTemplate;
use crate::task::Task;

/// Build every command of a parsed template and pipe neighbors together.
///
/// Each command's redirects are created in declaration order and chained;
/// then the command is assembled, and its stdin is piped from the previous
/// command's stdout. Any failure discards the whole pipeline.
pub fn build_pipeline<T: Task>(
    merger: &FragmentMerger,
    parsed: ParsedTemplate,
) -> Result<Vec<T>, BuildError> {
    let mut tasks: Vec<T> = Vec::with_capacity(parsed.commands.len());
    for command in parsed.commands {
        let mut chain = RedirectChain::new();
        for spec in command.redirects {
            let created = redirect::from_spec(merger, spec)?;
            chain = redirect::merge_chains(chain, created.into());
        }
        let mut task: T = create_command(merger, command.words, chain)?;
        if let Some(previous) = tasks.last_mut() {
            redirect::pipe(previous, &mut task);
        }
        tasks.push(task);
    }
    debug!("pipeline: {} task(s)", tasks.len());
    Ok(tasks)
}
