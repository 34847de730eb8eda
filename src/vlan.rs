/*
 * Copyright 2025 Oxide Computer Company
 */

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

pub const VLAN_MIN: u16 = 1;
pub const VLAN_MAX: u16 = 4094;

pub fn check(id: u16) -> Result<u16> {
    if id < VLAN_MIN || id > VLAN_MAX {
        return Err(Error::out_of_range(
            "VLAN ID",
            id,
            VLAN_MIN.into(),
            VLAN_MAX.into(),
        ));
    }
    Ok(id)
}

/*
 * Merge a set of IDs into maximal runs of consecutive values.
 */
fn compact_id_list(list: &BTreeSet<u16>) -> Vec<RangeInclusive<u16>> {
    let mut out: Vec<RangeInclusive<u16>> = Vec::new();

    for &id in list {
        if let Some(last) = out.last_mut() {
            if u32::from(id) == u32::from(*last.end()) + 1 {
                *last = *last.start()..=id;
                continue;
            }
        }
        out.push(id..=id);
    }

    out
}

/*
 * Render a set of VLAN IDs in the compact notation the device expects, e.g.
 * "1,10-11,13".  An empty set produces an empty string.
 */
pub fn compress(list: &BTreeSet<u16>) -> String {
    compact_id_list(list)
        .into_iter()
        .map(|r| {
            if r.start() == r.end() {
                r.start().to_string()
            } else {
                format!("{}-{}", r.start(), r.end())
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_id(t: &str) -> Result<u16> {
    let bad = || Error::invalid_value("VLAN list entry", t);

    let d = t.trim();
    if d.is_empty() || !d.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    check(d.parse::<u16>().map_err(|_| bad())?)
}

/*
 * The inverse of compress(): accept a comma-separated list of IDs and
 * inclusive "first-last" ranges.
 */
pub fn expand(list: &str) -> Result<BTreeSet<u16>> {
    let mut out: BTreeSet<u16> = Default::default();

    if list.trim().is_empty() {
        return Ok(out);
    }

    for t in list.split(',') {
        if let Some((first, last)) = t.split_once('-') {
            let (first, last) = (parse_id(first)?, parse_id(last)?);
            if first > last {
                return Err(Error::invalid_value("VLAN range", t));
            }
            out.extend(first..=last);
        } else {
            out.insert(parse_id(t)?);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_id_list_compaction_empty() {
        let list = [].into_iter().collect::<BTreeSet<u16>>();

        let out = compact_id_list(&list);

        let want: Vec<RangeInclusive<u16>> = Vec::new();
        assert_eq!(want, out);
        assert_eq!(compress(&list), "");
    }

    #[test]
    fn basic_id_list_compaction_one_element() {
        let list = [3210].into_iter().collect::<BTreeSet<u16>>();

        let out = compact_id_list(&list);

        let want = vec![3210..=3210];
        assert_eq!(want, out);
    }

    #[test]
    fn basic_id_list_compaction() {
        let list =
            [1, 10, 11, 13, 15, 20, 21, 22, 999, 1000, 1001, 1002, 1005, 4094]
                .into_iter()
                .collect::<BTreeSet<u16>>();

        let out = compact_id_list(&list);

        let want = vec![
            1..=1,
            10..=11,
            13..=13,
            15..=15,
            20..=22,
            999..=1002,
            1005..=1005,
            4094..=4094,
        ];
        assert_eq!(want, out);
        assert_eq!(compress(&list), "1,10-11,13,15,20-22,999-1002,1005,4094");
    }

    #[test]
    fn round_trip() -> Result<()> {
        let sets: Vec<BTreeSet<u16>> = vec![
            Default::default(),
            [1].into(),
            [10, 20].into(),
            [1, 2, 3, 4094].into(),
            (100..=200).chain([7, 9, 11, 300]).collect(),
            (1..=4094).collect(),
            (1..=4094).filter(|n| n % 2 == 0).collect(),
        ];

        for s in sets {
            assert_eq!(expand(&compress(&s))?, s);
        }
        Ok(())
    }

    #[test]
    fn expand_rejects_garbage() {
        for l in
            ["0", "4095", "1-", "a", "5-3", "1,,2", "10-4095", "+5", "1-+3"]
        {
            assert!(expand(l).is_err(), "{l:?} should have been rejected");
        }
        assert_eq!(expand(" 3, 1-2 ").unwrap(), [1, 2, 3].into());
    }

    proptest! {
        #[test]
        fn compress_then_expand(
            s in prop::collection::btree_set(VLAN_MIN..=VLAN_MAX, 0..128)
        ) {
            prop_assert_eq!(expand(&compress(&s)).unwrap(), s);
        }
    }
}
