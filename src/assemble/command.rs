//! Assembly of one command from its words and redirects.

use log::debug;

use crate::assemble::merge::FragmentMerger;
use crate::assemble::redirect::{self, RedirectChain};
use crate::error::BuildError;
use crate::parse::FragmentChain;
use crate::task::Task;

/// Create a task whose arguments are `words`, merged in order, followed by
/// `redirects`.
///
/// The first merge failure aborts the command and the half-built task is
/// dropped.
pub fn create_command<T: Task>(
    merger: &FragmentMerger,
    words: impl IntoIterator<Item = FragmentChain>,
    redirects: RedirectChain,
) -> Result<T, BuildError> {
    let mut task = T::create();
    let mut count = 0usize;
    for word in words {
        task.add_argument(merger.merge(word)?);
        count += 1;
    }
    debug!("command: {count} argument(s), {} redirect(s)", redirects.len());
    redirect::append(&mut task, redirects);
    Ok(task)
}
