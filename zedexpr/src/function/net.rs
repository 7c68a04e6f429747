//! Network functions.
use std::net::{IpAddr, Ipv4Addr};

use ipnetwork::IpNetwork;
use zedcore::{
    coerce::to_int,
    types::PrimitiveId,
    value::{Value, WalkSignal},
};

use crate::{expr::EvalContext, function::fail_on};

/// Prefix length of the classful network holding `ip`.
fn classful_bits(ip: Ipv4Addr) -> u8 {
    match ip.octets()[0] {
        0..=127 => 8,
        128..=191 => 16,
        _ => 24,
    }
}

fn masked(ip: IpAddr, bits: u8) -> Option<IpNetwork> {
    let net = IpNetwork::new(ip, bits).ok()?;
    IpNetwork::new(net.network(), bits).ok()
}

/// `network_of(ip[, mask])`: the network holding `ip`. The mask is an ip
/// netmask or a prefix length; without one, the classful network is used.
pub fn network_of(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let ip_arg = args[0].under();
    let Some(ip) = ip_arg.as_ip().filter(|_| ip_arg.ty().is(PrimitiveId::Ip)) else {
        return fail_on(ectx, "network_of", "not an IP", &args[0]);
    };
    let bits = match args.get(1).map(Value::under) {
        None => match ip {
            IpAddr::V4(v4) => classful_bits(v4),
            IpAddr::V6(_) => return fail_on(ectx, "network_of", "not an IPv4 address", &args[0]),
        },
        Some(mask) if mask.ty().is(PrimitiveId::Ip) => {
            let Some(m) = mask.as_ip() else {
                return fail_on(ectx, "network_of", "bad arg for CIDR mask", &mask);
            };
            match ipnetwork::ip_mask_to_prefix(m) {
                Ok(bits) if m.is_ipv4() == ip.is_ipv4() => bits,
                _ => return fail_on(ectx, "network_of", "mask is non-canonical", &mask),
            }
        }
        Some(mask) if mask.ty().primitive_id().is_some_and(PrimitiveId::is_integer) => {
            match to_int(&mask).and_then(|n| u8::try_from(n).ok()) {
                Some(bits) => bits,
                None => return fail_on(ectx, "network_of", "CIDR bit count out of range", &mask),
            }
        }
        Some(mask) => return fail_on(ectx, "network_of", "bad arg for CIDR mask", &mask),
    };
    match masked(ip, bits) {
        Some(net) => Value::net(net),
        None => fail_on(ectx, "network_of", "CIDR bit count out of range", &args[0]),
    }
}

/// `cidr_match(net, v)`: whether any ip reachable in `v` lies in `net`.
pub fn cidr_match(ectx: &mut EvalContext, args: &[Value]) -> Value {
    let net_arg = args[0].under();
    let Some(net) = net_arg.as_net().filter(|_| net_arg.ty().is(PrimitiveId::Net)) else {
        return fail_on(ectx, "cidr_match", "not a net", &args[0]);
    };
    if args[1].is_error() {
        return args[1].clone();
    }
    let mut found = false;
    let walked = args[1].walk(&mut |ty, body| {
        if ty.is(PrimitiveId::Ip)
            && let Some(body) = body
            && Value::from_slice(ty.clone(), Some(body))
                .as_ip()
                .is_some_and(|ip| net.contains(ip))
        {
            found = true;
            return Ok(WalkSignal::Stop);
        }
        Ok(WalkSignal::Continue)
    });
    Value::bool(walked.is_ok() && found)
}

#[cfg(test)]
mod tests {
    use crate::{expr::testing::ectx, function::testing::call};

    #[test]
    fn networks() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "network_of", &["10.1.2.3"]), "10.0.0.0/8");
        assert_eq!(call(&mut ectx, "network_of", &["172.16.5.4"]), "172.16.0.0/16");
        assert_eq!(call(&mut ectx, "network_of", &["192.168.1.9"]), "192.168.1.0/24");
        assert_eq!(call(&mut ectx, "network_of", &["10.1.2.3", "255.255.255.0"]), "10.1.2.0/24");
        assert_eq!(call(&mut ectx, "network_of", &["10.1.2.3", "12"]), "10.0.0.0/12");
        assert!(call(&mut ectx, "network_of", &["10.1.2.3", "255.0.255.0"]).contains("non-canonical"));
        assert!(call(&mut ectx, "network_of", &["::1"]).contains("not an IPv4"));
        assert!(call(&mut ectx, "network_of", &["\"x\""]).contains("not an IP"));
    }

    #[test]
    fn matching() {
        let mut ectx = ectx();
        assert_eq!(call(&mut ectx, "cidr_match", &["10.0.0.0/8", "{a:[1.1.1.1,10.9.9.9]}"]), "true");
        assert_eq!(call(&mut ectx, "cidr_match", &["10.0.0.0/8", "{a:1.1.1.1}"]), "false");
        assert!(call(&mut ectx, "cidr_match", &["1", "{}"]).starts_with("error("));
    }
}
