use log::{debug, warn};

use crate::config::{Point, Resolution, Section};
use crate::geometry::contains;

/// Finds the section that contains a point.
///
/// Sections are scanned in the given order and the first match wins. Sections are
/// expected to partition the territory: if two of them overlap, the answer depends on
/// their order in the input.
///
/// Sections without a geometry never match. A malformed geometry is reported and
/// treated as not matching, and the scan continues with the next section.
pub fn resolve<'a, I>(point: &Point, sections: I) -> Resolution
where
    I: IntoIterator<Item = &'a Section>,
{
    for section in sections {
        let geometry = match &section.geometry {
            Some(g) => g,
            None => continue,
        };
        match contains(geometry, point) {
            Ok(true) => {
                debug!("resolve: {:?} -> section {}", point, section.id);
                return Resolution::Section(section.id);
            }
            Ok(false) => {}
            Err(e) => {
                warn!("resolve: skipping section {}: {}", section.id, e);
            }
        }
    }
    debug!("resolve: {:?} -> unresolved", point);
    Resolution::Unresolved
}
