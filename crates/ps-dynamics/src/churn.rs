//! `DynamicNetwork` — programmed growth and shrinkage of the population.
//!
//! # Configuration keys
//!
//! | Key          | Default            | Meaning                                     |
//! |--------------|--------------------|---------------------------------------------|
//! | `add`        | required           | rate per execution; see below               |
//! | `substitute` | off                | remove as many as are added, ignore bounds  |
//! | `minsize`    | 0                  | lower bound on the population size          |
//! | `maxsize`    | network capacity   | upper bound on the population size          |
//! | `down`       | off                | "remove" by flipping nodes to `Down`        |
//! | `init.<n>`   | none               | node initializers applied to added nodes    |
//!
//! `add` is an absolute count when `|add| ≥ 1` and a fraction of the current
//! size otherwise; negative values remove.  Fractional counts are truncated.
//!
//! Structural removal swaps a uniformly chosen node with the last one and
//! truncates, so every node index may change across one execution.

use ps_core::params::key;
use ps_core::{Params, PsError, PsResult};
use ps_network::{Control, ControlContext, Liveness, NetworkResult, NodeInitializer};

use crate::NodeFactory;

pub const PAR_ADD: &str = "add";
pub const PAR_SUBST: &str = "substitute";
pub const PAR_MIN: &str = "minsize";
pub const PAR_MAX: &str = "maxsize";
pub const PAR_DOWN: &str = "down";
pub const PAR_INIT: &str = "init";

/// Churn controller.
pub struct DynamicNetwork {
    add:          f64,
    substitute:   bool,
    min_size:     usize,
    /// `None` means "the network's capacity at execution time".
    max_size:     Option<usize>,
    down:         bool,
    factory:      Box<dyn NodeFactory>,
    initializers: Vec<Box<dyn NodeInitializer>>,
}

impl DynamicNetwork {
    pub fn new(add: f64, factory: Box<dyn NodeFactory>) -> Self {
        Self {
            add,
            substitute: false,
            min_size: 0,
            max_size: None,
            down: false,
            factory,
            initializers: Vec::new(),
        }
    }

    /// Read the controller configured under `prefix`.  Initializers are
    /// resolved by the caller (their names are listed under
    /// `<prefix>.init`) and passed in declaration order.
    pub fn from_params(
        params:       &Params,
        prefix:       &str,
        factory:      Box<dyn NodeFactory>,
        initializers: Vec<Box<dyn NodeInitializer>>,
    ) -> PsResult<Self> {
        let add = params.get_f64(&key(prefix, PAR_ADD))?;
        let min_size = params.get_usize_or(&key(prefix, PAR_MIN), 0)?;
        let max_key = key(prefix, PAR_MAX);
        let max_size =
            if params.contains(&max_key) { Some(params.get_usize(&max_key)?) } else { None };
        if let Some(max) = max_size {
            if max < min_size {
                return Err(PsError::illegal(max_key, format!("{max} is below {PAR_MIN} {min_size}")));
            }
        }
        Ok(Self {
            add,
            substitute: params.contains(&key(prefix, PAR_SUBST)),
            min_size,
            max_size,
            down: params.contains(&key(prefix, PAR_DOWN)),
            factory,
            initializers,
        })
    }

    pub fn with_bounds(mut self, min_size: usize, max_size: usize) -> Self {
        self.min_size = min_size;
        self.max_size = Some(max_size);
        self
    }

    pub fn substituting(mut self) -> Self {
        self.substitute = true;
        self
    }

    pub fn down_mode(mut self) -> Self {
        self.down = true;
        self
    }

    pub fn initializer(mut self, init: Box<dyn NodeInitializer>) -> Self {
        self.initializers.push(init);
        self
    }

    /// `(to_add, to_remove)` for a population of `size` with upper bound
    /// `max_size`.
    pub fn plan(&self, size: usize, max_size: usize) -> (usize, usize) {
        if self.add == 0.0 {
            return (0, 0);
        }
        let count = |rate: f64| -> usize {
            if rate < 1.0 { (rate * size as f64) as usize } else { rate as usize }
        };
        if self.add > 0.0 {
            if !self.substitute && size >= max_size {
                return (0, 0);
            }
            let mut n = count(self.add);
            if self.substitute {
                return (n, n);
            }
            n = n.min(max_size - size);
            (n, 0)
        } else {
            if !self.substitute && size <= self.min_size {
                return (0, 0);
            }
            let mut n = count(-self.add);
            if self.substitute {
                return (n, n);
            }
            n = n.min(size - self.min_size);
            (0, n)
        }
    }

    /// Create, initialize and append `n` nodes.
    fn add_nodes(&mut self, n: usize, ctx: &mut ControlContext<'_>) -> NetworkResult<()> {
        for _ in 0..n {
            let id = ctx.network.allocate_id();
            let mut node = self.factory.create(id)?;
            {
                let mut ictx = ctx.init_context();
                for init in &mut self.initializers {
                    init.initialize(&mut node, &mut ictx)?;
                }
            }
            ctx.network.add(node)?;
        }
        Ok(())
    }

    /// Remove `n` nodes, or flip `n` `Up` nodes to `Down` in down mode.
    fn remove_nodes(&self, n: usize, ctx: &mut ControlContext<'_>) -> NetworkResult<()> {
        if self.down {
            let mut up = ctx.network.census().up;
            for _ in 0..n {
                if up == 0 {
                    break;
                }
                loop {
                    let j = ctx.rng.index(ctx.network.len());
                    let node = ctx.network.node_mut(j)?;
                    if node.is_up() {
                        node.set_liveness(Liveness::Down);
                        up -= 1;
                        break;
                    }
                }
            }
        } else {
            for _ in 0..n {
                if ctx.network.is_empty() {
                    break;
                }
                let j = ctx.rng.index(ctx.network.len());
                ctx.network.remove_at(j)?;
            }
        }
        Ok(())
    }
}

impl Control for DynamicNetwork {
    fn execute(&mut self, ctx: &mut ControlContext<'_>) -> NetworkResult<bool> {
        let size = ctx.network.len();
        let max_size = self.max_size.unwrap_or(ctx.network.capacity());
        let (to_add, to_remove) = self.plan(size, max_size);
        if to_add == 0 && to_remove == 0 {
            return Ok(false);
        }
        self.remove_nodes(to_remove, ctx)?;
        self.add_nodes(to_add, ctx)?;
        tracing::debug!(
            time = %ctx.time,
            added = to_add,
            removed = to_remove,
            down = self.down,
            size = ctx.network.len(),
            "churn"
        );
        Ok(false)
    }
}
