//! Scope management for local slot resolution during compilation.

/// A local variable in a scope.
#[derive(Debug, Clone)]
pub struct Local {
    /// The variable name
    pub name: String,
    /// Block depth it was bound at
    pub depth: usize,
    /// Frame slot
    pub slot: u16,
}

/// The lexical scopes of one function unit.
#[derive(Debug, Default)]
pub struct Scope {
    /// Live locals, innermost last
    pub locals: Vec<Local>,
    /// Current scope depth (0 = unit top level)
    pub depth: usize,
    /// Most locals live at once, i.e. the frame size
    pub high_water: u16,
}

impl Scope {
    /// No locals, at unit top level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a nested block.
    pub fn begin_scope(&mut self) {
        self.depth += 1;
    }

    /// End the current scope and return the number of locals released.
    ///
    /// Returns `None` when no scope is open.
    pub fn end_scope(&mut self) -> Option<usize> {
        if self.depth == 0 {
            return None;
        }
        let keep = self
            .locals
            .iter()
            .rposition(|local| local.depth < self.depth)
            .map_or(0, |i| i + 1);
        let released = self.locals.len() - keep;
        self.locals.truncate(keep);
        self.depth -= 1;
        Some(released)
    }

    /// Binds `name` in the innermost scope and returns its slot.
    ///
    /// A name already bound at this depth keeps its slot. Returns `None`
    /// when every slot is taken.
    pub fn declare(&mut self, name: &str) -> Option<u16> {
        let existing = self
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth == self.depth)
            .find(|local| local.name == name);
        if let Some(local) = existing {
            return Some(local.slot);
        }

        let live = u16::try_from(self.locals.len() + 1).ok()?;
        let slot = live - 1;
        self.locals.push(Local {
            name: name.to_string(),
            depth: self.depth,
            slot,
        });
        self.high_water = self.high_water.max(live);
        Some(slot)
    }

    /// Resolve a local variable by name, returning its slot.
    pub fn resolve(&self, name: &str) -> Option<u16> {
        self.locals
            .iter()
            .rev()
            .find(|local| local.name == name)
            .map(|local| local.slot)
    }

    /// Whether `name` resolves to a live local.
    pub fn is_local(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}
