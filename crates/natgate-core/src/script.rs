//! Renders forward plans into an iptables shell script.
//!
//! Output is a pure function of the input order, so repeated runs over an
//! unchanged snapshot produce byte-identical scripts.

use std::fmt::{self, Write};

use crate::forward::Forward;

pub const DEFAULT_IPTABLES: &str = "/sbin/iptables";

/// Which rules to emit for each forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NatMode {
    /// DNAT and FORWARD per port, then SNAT.
    #[default]
    Expose,
    /// SNAT only.
    Outbound,
}

#[derive(Debug, Clone)]
pub struct ScriptRenderer {
    /// Path of the iptables binary on the gateway.
    pub iptables: String,
    /// Flush the filter and nat tables before adding rules.
    pub clear: bool,
}

impl Default for ScriptRenderer {
    fn default() -> Self {
        Self {
            iptables: DEFAULT_IPTABLES.to_string(),
            clear: false,
        }
    }
}

impl ScriptRenderer {
    pub fn new(iptables: impl Into<String>, clear: bool) -> Self {
        Self {
            iptables: iptables.into(),
            clear,
        }
    }

    /// Render a complete script for one gateway.
    pub fn render(&self, mode: NatMode, forwards: &[Forward<'_>]) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_script(&mut out, mode, forwards);
        out
    }

    pub fn write_script<W: Write>(
        &self,
        w: &mut W,
        mode: NatMode,
        forwards: &[Forward<'_>],
    ) -> fmt::Result {
        self.write_start(w)?;
        if self.clear {
            self.write_clear(w)?;
        }
        for fwd in forwards {
            match mode {
                NatMode::Expose => self.write_expose(w, fwd)?,
                NatMode::Outbound => self.write_outbound(w, fwd)?,
            }
            writeln!(w)?;
        }
        Ok(())
    }

    pub fn write_start<W: Write>(&self, w: &mut W) -> fmt::Result {
        writeln!(w, "#!/bin/sh")
    }

    pub fn write_clear<W: Write>(&self, w: &mut W) -> fmt::Result {
        writeln!(w, "{} -F", self.iptables)?;
        writeln!(w, "{} -F -t nat", self.iptables)
    }

    /// DNAT and FORWARD rules for each port, followed by the SNAT rule.
    pub fn write_expose<W: Write>(&self, w: &mut W, fwd: &Forward<'_>) -> fmt::Result {
        let ipt = &self.iptables;
        let dev = &fwd.external_gateway_device;
        let ext = &fwd.external_gateway_addr;
        let host = &fwd.internal_host_addr;
        for (port, ext_port) in fwd.exposed_ports() {
            let proto = port.protocol.as_str();
            writeln!(
                w,
                "{ipt} -t nat -A PREROUTING -p {proto} -i {dev} -d {ext} --dport {ext_port} -j DNAT --to {host}:{}",
                port.number
            )?;
            writeln!(
                w,
                "{ipt} -A FORWARD -p {proto} -i {dev} -d {ext} --dport {ext_port} -j ACCEPT"
            )?;
        }
        self.write_outbound(w, fwd)
    }

    pub fn write_outbound<W: Write>(&self, w: &mut W, fwd: &Forward<'_>) -> fmt::Result {
        writeln!(
            w,
            "{} -t nat -A POSTROUTING -s {} -o {} -j SNAT --to {}",
            self.iptables,
            fwd.internal_host_addr,
            fwd.external_gateway_device,
            fwd.external_gateway_addr
        )
    }
}
