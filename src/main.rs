//! # media-catalog CLI
//!
//! Command-line interface for the media cataloging engine.
//!
//! ## Usage
//! ```bash
//! media-catalog index /Volumes/EOS_DIGITAL/DCIM
//! media-catalog volumes list --json
//! media-catalog render media://thumbnail/<asset id> --out thumb.jpg
//! ```

mod cli;

use media_catalog::Result;

fn main() -> Result<()> {
    media_catalog::init_tracing();
    cli::run()
}
