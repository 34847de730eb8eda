/*
 * Copyright 2025 Oxide Computer Company
 */

/*
 * Schema paths for every node the compiler touches.  These strings must
 * match the device schema exactly; list keys are substituted verbatim.
 */

pub const DEFAULT_VRF: &str = "default";

pub fn phys_if(id: &str) -> String {
    format!("System/intf-items/phys-items/PhysIf-list[id={id}]")
}

pub fn loopback_if(id: &str) -> String {
    format!("System/intf-items/lb-items/LbRtdIf-list[id={id}]")
}

pub fn aggr_if(id: &str) -> String {
    format!("System/intf-items/aggr-items/AggrIf-list[id={id}]")
}

pub fn stp_if(id: &str) -> String {
    format!("System/stp-items/inst-items/if-items/If-list[id={id}]")
}

pub fn ipv4_if(vrf: &str, id: &str) -> String {
    format!(
        "System/ipv4-items/inst-items/dom-items/Dom-list[name={vrf}]\
        /if-items/If-list[id={id}]"
    )
}

pub fn ipv6_if(vrf: &str, id: &str) -> String {
    format!(
        "System/ipv6-items/inst-items/dom-items/Dom-list[name={vrf}]\
        /if-items/If-list[id={id}]"
    )
}

pub const FEATURE_LACP: &str = "System/fm-items/lacp-items";
pub const FEATURE_OSPF: &str = "System/fm-items/ospf-items";

pub fn ospf_inst(name: &str) -> String {
    format!("System/ospf-items/inst-items/Inst-list[name={name}]")
}

pub fn ospf_if(name: &str, vrf: &str, id: &str) -> String {
    format!(
        "{}/dom-items/Dom-list[name={vrf}]/if-items/If-list[id={id}]",
        ospf_inst(name)
    )
}

pub fn trust_point(name: &str) -> String {
    format!("System/userext-items/pkiext-items/tp-items/TP-list[name={name}]")
}

/*
 * Relations between objects (VRF membership, aggregate members) are
 * expressed as a distinguished name of the target, which uses quoted keys
 * and a leading slash.
 */
pub fn vrf_dn(vrf: &str) -> String {
    format!("/System/inst-items/Inst-list[name='{vrf}']")
}

pub fn phys_if_dn(id: &str) -> String {
    format!("/System/intf-items/phys-items/PhysIf-list[id='{id}']")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn templates() {
        assert_eq!(
            phys_if("eth1/1"),
            "System/intf-items/phys-items/PhysIf-list[id=eth1/1]"
        );
        assert_eq!(
            ospf_if("OSPF1", DEFAULT_VRF, "eth1/1"),
            "System/ospf-items/inst-items/Inst-list[name=OSPF1]\
            /dom-items/Dom-list[name=default]/if-items/If-list[id=eth1/1]"
        );
        assert_eq!(
            ipv4_if("blue", "lo0"),
            "System/ipv4-items/inst-items/dom-items/Dom-list[name=blue]\
            /if-items/If-list[id=lo0]"
        );
        assert_eq!(vrf_dn("blue"), "/System/inst-items/Inst-list[name='blue']");
    }
}
