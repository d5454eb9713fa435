//! Change detection between two property snapshots.

use crate::resolver::{self, VariableBuilder};
use crate::value::PropertySet;

/// Decide whether a request must be reissued after a property update.
///
/// Variables are resolved from both snapshots; a missing builder counts as an
/// empty mapping on both sides, so a request without variables never
/// changes. The comparison is [`Variables::shallow_eq`].
pub fn changed(builder: Option<&VariableBuilder>, prev: &PropertySet, next: &PropertySet) -> bool {
    let before = resolver::resolve(builder, prev).unwrap_or_default();
    let after = resolver::resolve(builder, next).unwrap_or_default();
    let changed = !before.shallow_eq(&after);
    tracing::trace!(
        target: "lattice_bind::change",
        changed,
        before = ?before,
        after = ?after,
        "compared variables"
    );
    changed
}
