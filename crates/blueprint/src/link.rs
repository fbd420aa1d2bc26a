//! Reference linking
//!
//! Turns the typed references each resource declares (networks, targets,
//! clusters) and its user-declared `depends_on` list into `depends_on` edges.
//! Edges are appended and never deduplicated, so linking a graph twice would
//! double them. `Config` records that it has been linked and a second call
//! fails instead.

use crate::config::Config;
use crate::error::Result;

/// Materialize every resource's references as dependency edges
pub fn parse_references(config: &mut Config) -> Result<()> {
    config.mark_linked()?;

    for resource in config.resources_mut() {
        let references = resource.references();
        let info = resource.info_mut();
        let declared = info.depends.clone();

        if !references.is_empty() || !declared.is_empty() {
            log::debug!(
                "Linking {}: {} reference(s), {} declared",
                info.id(),
                references.len(),
                declared.len()
            );
        }
        info.depends_on.extend(references);
        info.depends_on.extend(declared);
    }
    Ok(())
}
