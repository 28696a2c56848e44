//! Where new nodes come from.

use ps_core::NodeId;
use ps_network::{Network, NetworkResult, Node, Protocol};

/// Builds a node with a fresh identity and one instance per protocol slot.
///
/// Any `Fn(NodeId) -> NetworkResult<Node>` closure is a factory.
pub trait NodeFactory {
    fn create(&self, id: NodeId) -> NetworkResult<Node>;
}

impl<F> NodeFactory for F
where
    F: Fn(NodeId) -> NetworkResult<Node>,
{
    fn create(&self, id: NodeId) -> NetworkResult<Node> {
        self(id)
    }
}

/// Factory that deep-copies a template node.
///
/// The template is private to the factory and never part of the network, so
/// no two nodes share protocol state.
#[derive(Debug)]
pub struct PrototypeFactory {
    prototype: Node,
}

impl PrototypeFactory {
    pub fn new(protocols: Vec<Box<dyn Protocol>>) -> Self {
        Self { prototype: Node::new(NodeId::INVALID, protocols) }
    }

    pub fn prototype(&self) -> &Node {
        &self.prototype
    }
}

impl NodeFactory for PrototypeFactory {
    fn create(&self, id: NodeId) -> NetworkResult<Node> {
        self.prototype.duplicate(id)
    }
}

/// Append `count` factory-made nodes to `network`.
pub fn populate(
    network: &mut Network,
    count:   usize,
    factory: &dyn NodeFactory,
) -> NetworkResult<()> {
    for _ in 0..count {
        let id = network.allocate_id();
        network.add(factory.create(id)?)?;
    }
    Ok(())
}
