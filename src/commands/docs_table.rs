//! docs-table command

use crate::cli::DocsTableArgs;
use crate::docs_table;
use crate::error::Result;

/// Print the package table to stdout
pub fn run(args: DocsTableArgs) -> Result<()> {
    let table = docs_table::generate(&args.dir, args.arch.as_deref())?;
    print!("{table}");
    Ok(())
}
