use arg_common::{NodeName, Position, Time};

/// A point mutation on the edge `child -> parent`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mutation {
    pub child: NodeName,
    pub parent: NodeName,
    pub pos: Position,
    pub time: Time,
}

impl Mutation {
    pub fn new(child: NodeName, parent: NodeName, pos: Position, time: Time) -> Self {
        Self {
            child,
            parent,
            pos,
            time,
        }
    }
}
