//! `ComponentRegistry` — configuration type keys → component constructors.
//!
//! A configuration names component *types* by string:
//!
//! ```text
//! protocol.avg          Average
//! dynamics.churn        DynamicNetwork
//! dynamics.churn.init.w WireKOut
//! ```
//!
//! Every such key must be registered here before
//! [`SimBuilder::from_params`][crate::SimBuilder::from_params] resolves the
//! configuration.  Protocol capabilities are declared at registration time
//! as a [`ProtocolSpec`] transformer, so nothing is discovered by inspecting
//! instances at run time.
//!
//! # Built-in keys
//!
//! | Key                | Protocol | Control | Node initializer |
//! |--------------------|:--------:|:-------:|:----------------:|
//! | `UniformTransport` | ✓        |         |                  |
//! | `DynamicNetwork`   |          | ✓       |                  |
//! | `WireKOut`         |          | ✓       | ✓                |
//! | `WireRingLattice`  |          | ✓       |                  |
//! | `CdScheduler`      |          | ✓       | ✓                |

use std::collections::BTreeMap;
use std::fmt;

use ps_core::params::key;
use ps_core::Params;
use ps_dynamics::{CdScheduler, DynamicNetwork, PrototypeFactory, WireKOut, WireRingLattice};
use ps_network::{
    Control, NodeInitializer, Protocol, ProtocolSpec, ProtocolTable, UniformTransport,
};
use ps_schedule::Scheduler;

use crate::{SimError, SimResult};

pub const PAR_PROTOCOL: &str = "protocol";
pub const PAR_INIT: &str = "init";

type ProtocolBuild = Box<dyn Fn(&Resolver<'_>, &str) -> SimResult<Box<dyn Protocol>>>;
type ControlBuild = Box<dyn Fn(&Resolver<'_>, &str) -> SimResult<Box<dyn Control>>>;
type InitBuild = Box<dyn Fn(&Resolver<'_>, &str) -> SimResult<Box<dyn NodeInitializer>>>;

struct ProtocolEntry {
    capabilities: fn(ProtocolSpec) -> ProtocolSpec,
    build:        ProtocolBuild,
}

/// Type key → constructor tables for protocols, controls and node
/// initializers.
#[derive(Default)]
pub struct ComponentRegistry {
    protocols:    BTreeMap<String, ProtocolEntry>,
    controls:     BTreeMap<String, ControlBuild>,
    initializers: BTreeMap<String, InitBuild>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the controls and initializers every simulation
    /// can use.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.protocol("UniformTransport", |s| s.transport::<UniformTransport>(), |res, prefix| {
            Ok(Box::new(UniformTransport::from_params(res.params, prefix)?) as Box<dyn Protocol>)
        })
        .control("DynamicNetwork", |res, prefix| {
            let inits = res.initializers(&key(prefix, PAR_INIT))?;
            let factory = res.factory()?;
            let dn = DynamicNetwork::from_params(res.params, prefix, Box::new(factory), inits)?;
            Ok(Box::new(dn) as Box<dyn Control>)
        })
        .control("WireKOut", |res, prefix| {
            Ok(Box::new(WireKOut::from_params(res.params, prefix, res.protocols)?) as Box<dyn Control>)
        })
        .control("WireRingLattice", |res, prefix| {
            let w = WireRingLattice::from_params(res.params, prefix, res.protocols)?;
            Ok(Box::new(w) as Box<dyn Control>)
        })
        .control("CdScheduler", |res, prefix| {
            let cd = CdScheduler::from_params(res.params, prefix, res.protocols)?;
            Ok(Box::new(cd) as Box<dyn Control>)
        })
        .initializer("WireKOut", |res, prefix| {
            let w = WireKOut::from_params(res.params, prefix, res.protocols)?;
            Ok(Box::new(w) as Box<dyn NodeInitializer>)
        })
        .initializer("CdScheduler", |res, prefix| {
            let cd = CdScheduler::from_params(res.params, prefix, res.protocols)?;
            Ok(Box::new(cd) as Box<dyn NodeInitializer>)
        });
        r
    }

    /// Register a protocol type.  `capabilities` adds the capability handles
    /// to the slot's spec, e.g. `|s| s.cycle::<Avg>().linkable::<Avg>()`.
    /// `build` runs once per node factory; the protocol table is complete by
    /// then, so it may resolve other slots by name.
    pub fn protocol<F>(
        &mut self,
        type_key:     &str,
        capabilities: fn(ProtocolSpec) -> ProtocolSpec,
        build:        F,
    ) -> &mut Self
    where
        F: Fn(&Resolver<'_>, &str) -> SimResult<Box<dyn Protocol>> + 'static,
    {
        self.protocols
            .insert(type_key.to_string(), ProtocolEntry { capabilities, build: Box::new(build) });
        self
    }

    pub fn control<F>(&mut self, type_key: &str, build: F) -> &mut Self
    where
        F: Fn(&Resolver<'_>, &str) -> SimResult<Box<dyn Control>> + 'static,
    {
        self.controls.insert(type_key.to_string(), Box::new(build));
        self
    }

    pub fn initializer<F>(&mut self, type_key: &str, build: F) -> &mut Self
    where
        F: Fn(&Resolver<'_>, &str) -> SimResult<Box<dyn NodeInitializer>> + 'static,
    {
        self.initializers.insert(type_key.to_string(), Box::new(build));
        self
    }

    pub fn has_protocol(&self, type_key: &str) -> bool {
        self.protocols.contains_key(type_key)
    }

    pub fn has_control(&self, type_key: &str) -> bool {
        self.controls.contains_key(type_key)
    }

    pub fn has_initializer(&self, type_key: &str) -> bool {
        self.initializers.contains_key(type_key)
    }

    /// Register one slot per `protocol.<name>` key, in declaration order.
    /// Returns the table and each slot's configuration prefix, indexed by
    /// `ProtocolId`.
    pub fn protocol_table(&self, params: &Params) -> SimResult<(ProtocolTable, Vec<String>)> {
        let mut table = ProtocolTable::new();
        let mut prefixes = Vec::new();
        for prefix in params.names(PAR_PROTOCOL)? {
            let entry = self.protocol_entry(params, &prefix)?;
            let name = prefix.strip_prefix("protocol.").unwrap_or(&prefix);
            let spec = ProtocolSpec::new(name).scheduled(Scheduler::from_params(params, &prefix)?);
            table.register((entry.capabilities)(spec));
            prefixes.push(prefix);
        }
        if table.is_empty() {
            return Err(SimError::Config("no protocol.* slot is configured".into()));
        }
        Ok((table, prefixes))
    }

    fn protocol_entry(&self, params: &Params, prefix: &str) -> SimResult<&ProtocolEntry> {
        let type_key = params.get_str(prefix)?;
        self.protocols
            .get(type_key)
            .ok_or_else(|| SimError::UnknownComponent { kind: "protocol", key: type_key.into() })
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("protocols", &self.protocols.keys().collect::<Vec<_>>())
            .field("controls", &self.controls.keys().collect::<Vec<_>>())
            .field("initializers", &self.initializers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ── Resolver ──────────────────────────────────────────────────────────────────

/// What a control or initializer constructor can see while a configuration
/// is being resolved.
pub struct Resolver<'a> {
    pub params:    &'a Params,
    pub protocols: &'a ProtocolTable,
    registry:      &'a ComponentRegistry,
    prefixes:      &'a [String],
}

impl<'a> Resolver<'a> {
    pub fn new(
        params:    &'a Params,
        protocols: &'a ProtocolTable,
        registry:  &'a ComponentRegistry,
        prefixes:  &'a [String],
    ) -> Self {
        Self { params, protocols, registry, prefixes }
    }

    /// A factory with one freshly built instance per configured slot.
    pub fn factory(&self) -> SimResult<PrototypeFactory> {
        let mut instances = Vec::with_capacity(self.prefixes.len());
        for prefix in self.prefixes {
            let entry = self.registry.protocol_entry(self.params, prefix)?;
            instances.push((entry.build)(self, prefix)?);
        }
        Ok(PrototypeFactory::new(instances))
    }

    /// Build the control declared at `prefix`.
    pub fn control(&self, prefix: &str) -> SimResult<Box<dyn Control>> {
        let type_key = self.params.get_str(prefix)?;
        let build = self
            .registry
            .controls
            .get(type_key)
            .ok_or_else(|| SimError::UnknownComponent { kind: "control", key: type_key.into() })?;
        build(self, prefix)
    }

    /// Build the node initializer declared at `prefix`.
    pub fn initializer(&self, prefix: &str) -> SimResult<Box<dyn NodeInitializer>> {
        let type_key = self.params.get_str(prefix)?;
        let build = self.registry.initializers.get(type_key).ok_or_else(|| {
            SimError::UnknownComponent { kind: "initializer", key: type_key.into() }
        })?;
        build(self, prefix)
    }

    /// Build every initializer declared under `list_prefix`, in declaration
    /// order.
    pub fn initializers(&self, list_prefix: &str) -> SimResult<Vec<Box<dyn NodeInitializer>>> {
        self.params.names(list_prefix)?.iter().map(|p| self.initializer(p)).collect()
    }
}
