/*
 * Copyright 2025 Oxide Computer Company
 */

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::path;

/*
 * Device interface identifiers arrive in whatever form the operator typed
 * them: "Ethernet1/1", "ethernet1/1" and "eth1/1" all name the same port.
 * The short form is what the schema uses as a list key.
 */
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterfaceName {
    Ethernet(String),
    Loopback(u32),
    PortChannel(u16),
}

pub const PORT_CHANNEL_MIN: u16 = 1;
pub const PORT_CHANNEL_MAX: u16 = 4096;

struct Patterns {
    ethernet: Regex,
    loopback: Regex,
    port_channel: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();

    PATTERNS.get_or_init(|| Patterns {
        ethernet: Regex::new(r"^(?i:ethernet|eth)(\d+/\d+(?:/\d+)?)$")
            .unwrap(),
        loopback: Regex::new(r"^(?i:loopback|lo)(\d+)$").unwrap(),
        port_channel: Regex::new(r"^(?i:port-channel|po)(\d+)$").unwrap(),
    })
}

impl InterfaceName {
    pub fn parse(s: &str) -> Result<InterfaceName> {
        let p = patterns();
        let unsupported = || Error::UnsupportedInterface(s.to_string());

        if let Some(c) = p.ethernet.captures(s) {
            /*
             * Slot and port numbers are stored without leading zeros, the
             * same as loopback and port-channel numbers.
             */
            let parts = c[1]
                .split('/')
                .map(|n| n.parse::<u32>().map(|n| n.to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| unsupported())?;
            return Ok(InterfaceName::Ethernet(parts.join("/")));
        }

        if let Some(c) = p.loopback.captures(s) {
            let n = c[1].parse::<u32>().map_err(|_| unsupported())?;
            return Ok(InterfaceName::Loopback(n));
        }

        if let Some(c) = p.port_channel.captures(s) {
            let n = c[1].parse::<u32>().map_err(|_| unsupported())?;
            if n < PORT_CHANNEL_MIN.into() || n > PORT_CHANNEL_MAX.into() {
                return Err(Error::out_of_range(
                    "port-channel number",
                    n,
                    PORT_CHANNEL_MIN.into(),
                    PORT_CHANNEL_MAX.into(),
                ));
            }
            return Ok(InterfaceName::PortChannel(n as u16));
        }

        Err(unsupported())
    }

    pub fn parse_ethernet(s: &str) -> Result<InterfaceName> {
        match InterfaceName::parse(s)? {
            n @ InterfaceName::Ethernet(_) => Ok(n),
            _ => Err(Error::UnsupportedInterface(s.to_string())),
        }
    }

    pub fn parse_loopback(s: &str) -> Result<InterfaceName> {
        match InterfaceName::parse(s)? {
            n @ InterfaceName::Loopback(_) => Ok(n),
            _ => Err(Error::UnsupportedInterface(s.to_string())),
        }
    }

    pub fn parse_port_channel(s: &str) -> Result<InterfaceName> {
        match InterfaceName::parse(s)? {
            n @ InterfaceName::PortChannel(_) => Ok(n),
            _ => Err(Error::UnsupportedInterface(s.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InterfaceName::Ethernet(_) => "physical interface",
            InterfaceName::Loopback(_) => "loopback interface",
            InterfaceName::PortChannel(_) => "port-channel",
        }
    }

    /*
     * The base node for this interface in the configuration tree.
     */
    pub fn path(&self) -> String {
        let id = self.to_string();
        match self {
            InterfaceName::Ethernet(_) => path::phys_if(&id),
            InterfaceName::Loopback(_) => path::loopback_if(&id),
            InterfaceName::PortChannel(_) => path::aggr_if(&id),
        }
    }
}

impl std::fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceName::Ethernet(n) => write!(f, "eth{n}"),
            InterfaceName::Loopback(n) => write!(f, "lo{n}"),
            InterfaceName::PortChannel(n) => write!(f, "po{n}"),
        }
    }
}

impl FromStr for InterfaceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        InterfaceName::parse(s)
    }
}

pub fn short_name(s: &str) -> Result<String> {
    Ok(InterfaceName::parse(s)?.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    /*
     * Spell a word with the case of each letter picked by the flags.
     */
    fn mixed_case(word: &str, upper: &[bool]) -> String {
        word.chars()
            .zip(upper.iter().cycle())
            .map(|(c, &u)| if u { c.to_ascii_uppercase() } else { c })
            .collect()
    }

    #[test]
    fn long_and_short_forms_agree() -> Result<()> {
        for n in ["Ethernet1/1", "ethernet1/1", "ETHERNET1/1", "eth1/1", "Eth1/1"]
        {
            assert_eq!(short_name(n)?, "eth1/1");
        }
        for n in ["Loopback0", "loopback0", "lo0", "LO0"] {
            assert_eq!(short_name(n)?, "lo0");
        }
        for n in ["Port-Channel10", "port-channel10", "po10", "Po10"] {
            assert_eq!(short_name(n)?, "po10");
        }
        assert_eq!(short_name("Ethernet1/2/3")?, "eth1/2/3");
        Ok(())
    }

    #[test]
    fn leading_zeros() -> Result<()> {
        assert_eq!(short_name("Ethernet01/1")?, "eth1/1");
        assert_eq!(short_name("eth1/001/02")?, "eth1/1/2");
        assert_eq!(short_name("lo00")?, "lo0");
        assert_eq!(short_name("po007")?, "po7");
        assert_eq!(
            InterfaceName::parse("Ethernet01/1")?,
            InterfaceName::parse("eth1/1")?
        );
        Ok(())
    }

    #[test]
    fn unsupported_formats() {
        for n in ["", "eth", "GigabitEthernet1", "eth1", "lo", "mgmt0", "po1a"]
        {
            assert!(
                matches!(short_name(n), Err(Error::UnsupportedInterface(_))),
                "{n:?} should have been rejected"
            );
        }
    }

    #[test]
    fn port_channel_range() {
        assert!(short_name("po1").is_ok());
        assert!(short_name("po4096").is_ok());
        assert!(matches!(short_name("po0"), Err(Error::OutOfRange { .. })));
        assert!(matches!(
            short_name("port-channel4097"),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn kind_specific_parsing() {
        assert!(InterfaceName::parse_ethernet("eth1/1").is_ok());
        assert!(InterfaceName::parse_ethernet("lo1").is_err());
        assert!(InterfaceName::parse_loopback("Loopback7").is_ok());
        assert!(InterfaceName::parse_loopback("po7").is_err());
        assert!(InterfaceName::parse_port_channel("po7").is_ok());
        assert!(InterfaceName::parse_port_channel("eth1/7").is_err());
    }

    #[test]
    fn base_paths() -> Result<()> {
        assert_eq!(
            "Ethernet1/1".parse::<InterfaceName>()?.path(),
            "System/intf-items/phys-items/PhysIf-list[id=eth1/1]"
        );
        assert_eq!(
            InterfaceName::parse("Loopback0")?.path(),
            "System/intf-items/lb-items/LbRtdIf-list[id=lo0]"
        );
        assert_eq!(
            InterfaceName::parse("po10")?.path(),
            "System/intf-items/aggr-items/AggrIf-list[id=po10]"
        );
        Ok(())
    }

    proptest! {
        #[test]
        fn every_spelling_normalizes(
            slot in 1u32..100,
            port in 1u32..100,
            upper in prop::collection::vec(any::<bool>(), 8),
        ) {
            let want = format!("eth{slot}/{port}");
            for prefix in ["Ethernet", "ethernet", "eth", "Eth"] {
                let n = format!("{prefix}{slot}/{port}");
                prop_assert_eq!(short_name(&n).unwrap(), want.clone());
            }
            for prefix in ["ethernet", "eth"] {
                let n = format!("{}{slot}/{port}", mixed_case(prefix, &upper));
                prop_assert_eq!(short_name(&n).unwrap(), want.clone());
            }
        }
    }
}
