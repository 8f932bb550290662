//! Parser for the kernel's CPU list format.
//!
//! The same syntax is used by `/sys/devices/system/node/nodeN/cpulist` and by
//! the cgroup `cpuset.cpus` control file: a comma-separated list of single ids
//! and inclusive `start-end` ranges, e.g. `0-3,7,16-17`. An empty string is an
//! empty set.

use std::collections::BTreeSet;

use crate::resources::CpuId;

/// Errors that may occur when parsing a CPU list.
#[derive(Debug, thiserror::Error)]
pub enum CpuListError {
    #[error("invalid cpu id `{value}` in cpu list `{list}`")]
    InvalidId { value: String, list: String },

    #[error("invalid cpu range `{range}` in cpu list `{list}`")]
    InvalidRange { range: String, list: String },
}

/// Parses a CPU list into a sorted, de-duplicated set of CPU ids.
///
/// # Errors
///
/// Returns [`CpuListError::InvalidId`] for non-numeric ids and
/// [`CpuListError::InvalidRange`] for ranges with more than two bounds or a
/// start greater than its end.
///
/// # Examples
///
/// ```
/// # use resource_topology_exporter::topology::parse_cpu_list;
/// let cpus = parse_cpu_list("0-3,7").unwrap();
/// assert_eq!(cpus.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 7]);
/// ```
pub fn parse_cpu_list(list: &str) -> Result<BTreeSet<CpuId>, CpuListError> {
    let list = list.trim();
    let mut cpus = BTreeSet::new();
    if list.is_empty() {
        return Ok(cpus);
    }

    for part in list.split(',') {
        let part = part.trim();
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_id(start, list)?;
                let end = parse_id(end, list).map_err(|_| CpuListError::InvalidRange {
                    range: part.to_owned(),
                    list: list.to_owned(),
                })?;
                if start > end {
                    return Err(CpuListError::InvalidRange {
                        range: part.to_owned(),
                        list: list.to_owned(),
                    });
                }
                cpus.extend(start..=end);
            }
            None => {
                cpus.insert(parse_id(part, list)?);
            }
        }
    }

    Ok(cpus)
}

fn parse_id(value: &str, list: &str) -> Result<CpuId, CpuListError> {
    value
        .trim()
        .parse::<CpuId>()
        .map_err(|_| CpuListError::InvalidId {
            value: value.to_owned(),
            list: list.to_owned(),
        })
}
