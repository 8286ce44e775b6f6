#![forbid(unsafe_code)]

//! A minimal drawing document and the built-in drafting commands.
//!
//! The document is a flat list of shapes with stable ids. It stands in for
//! the geometry kernel so the engine can be driven from the command line.

use std::fmt;
use std::str::FromStr;

use draft_engine::{
    Command, CommandError, CommandMetadata, CommandResult, Engine, ExecContext, FnCommand,
};

/// Stable shape identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(pub u64);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for ShapeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#').parse().map(ShapeId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Point {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected x,y but got '{s}'"))?;
        let coord = |v: &str| {
            v.trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("'{v}' is not a number"))
        };
        Ok(Self {
            x: coord(x)?,
            y: coord(y)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Line { from: Point, to: Point },
    Circle { center: Point, radius: f64 },
    Rectangle { corner: Point, opposite: Point },
}

impl Shape {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Line { .. } => "line",
            Self::Circle { .. } => "circle",
            Self::Rectangle { .. } => "rectangle",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line { from, to } => write!(f, "line {from} -> {to}"),
            Self::Circle { center, radius } => write!(f, "circle at {center} r={radius}"),
            Self::Rectangle { corner, opposite } => write!(f, "rectangle {corner} .. {opposite}"),
        }
    }
}

/// The document the CLI engine edits.
#[derive(Debug, Default)]
pub struct Drawing {
    shapes: Vec<(ShapeId, Shape)>,
    next_id: u64,
    messages: Vec<String>,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a shape under a fresh id.
    pub fn add(&mut self, shape: Shape) -> ShapeId {
        self.next_id += 1;
        let id = ShapeId(self.next_id);
        self.shapes.push((id, shape));
        id
    }

    /// Put a shape back at `index` under its old id.
    pub fn restore(&mut self, index: usize, id: ShapeId, shape: Shape) {
        let index = index.min(self.shapes.len());
        self.shapes.insert(index, (id, shape));
    }

    /// Remove a shape, returning where it was.
    pub fn remove(&mut self, id: ShapeId) -> Option<(usize, Shape)> {
        let index = self.shapes.iter().position(|(sid, _)| *sid == id)?;
        let (_, shape) = self.shapes.remove(index);
        Some((index, shape))
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|(sid, _)| *sid == id).map(|(_, s)| s)
    }

    pub fn shapes(&self) -> impl Iterator<Item = (ShapeId, &Shape)> {
        self.shapes.iter().map(|(id, s)| (*id, s))
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Text produced by commands since the last drain.
    pub fn drain_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    fn say(&mut self, message: String) {
        self.messages.push(message);
    }

    /// One line per shape, or a placeholder for an empty drawing.
    pub fn listing(&self) -> Vec<String> {
        if self.shapes.is_empty() {
            return vec!["(empty drawing)".to_string()];
        }
        self.shapes
            .iter()
            .map(|(id, shape)| format!("{id} {shape}"))
            .collect()
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Adds one shape; undo removes it, redo puts it back under the same id.
struct AddShape {
    metadata: CommandMetadata,
    shape: Shape,
    placed: Option<(usize, ShapeId)>,
}

impl AddShape {
    fn new(shape: Shape) -> Self {
        let metadata = CommandMetadata::new(shape.kind()).with_description(shape.to_string());
        Self {
            metadata,
            shape,
            placed: None,
        }
    }
}

impl Command<Drawing> for AddShape {
    fn execute(&mut self, doc: &mut Drawing, ctx: &ExecContext) -> CommandResult {
        ctx.check_cancelled()?;
        let id = doc.add(self.shape.clone());
        self.placed = Some((doc.len() - 1, id));
        doc.say(format!("added {id} {}", self.shape));
        Ok(())
    }

    fn undo(&mut self, doc: &mut Drawing) -> CommandResult {
        let (_, id) = self
            .placed
            .ok_or_else(|| CommandError::InvalidState("shape was never added".into()))?;
        let (index, _) = doc
            .remove(id)
            .ok_or_else(|| CommandError::InvalidState(format!("{id} is no longer in the drawing")))?;
        self.placed = Some((index, id));
        Ok(())
    }

    fn redo(&mut self, doc: &mut Drawing, ctx: &ExecContext) -> CommandResult {
        ctx.check_cancelled()?;
        let (index, id) = self
            .placed
            .ok_or_else(|| CommandError::InvalidState("shape was never added".into()))?;
        doc.restore(index, id, self.shape.clone());
        Ok(())
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut CommandMetadata {
        &mut self.metadata
    }

    fn debug_name(&self) -> &'static str {
        "AddShape"
    }
}

/// Removes one shape; undo reinserts it where it was.
struct EraseShape {
    metadata: CommandMetadata,
    id: ShapeId,
    removed: Option<(usize, Shape)>,
}

impl Command<Drawing> for EraseShape {
    fn execute(&mut self, doc: &mut Drawing, _ctx: &ExecContext) -> CommandResult {
        let removed = doc
            .remove(self.id)
            .ok_or_else(|| CommandError::invalid_arg("id", format!("no shape {}", self.id)))?;
        doc.say(format!("erased {} {}", self.id, removed.1));
        self.removed = Some(removed);
        Ok(())
    }

    fn undo(&mut self, doc: &mut Drawing) -> CommandResult {
        let (index, shape) = self
            .removed
            .take()
            .ok_or_else(|| CommandError::InvalidState("shape was never erased".into()))?;
        doc.restore(index, self.id, shape);
        Ok(())
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut CommandMetadata {
        &mut self.metadata
    }

    fn debug_name(&self) -> &'static str {
        "EraseShape"
    }
}

// ============================================================================
// Factories
// ============================================================================

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str, CommandError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| CommandError::MissingArgument(name.to_string()))
}

fn point(args: &[String], index: usize, name: &str) -> Result<Point, CommandError> {
    arg(args, index, name)?
        .parse()
        .map_err(|reason: String| CommandError::invalid_arg(name, reason))
}

fn boxed<C: Command<Drawing> + 'static>(cmd: C) -> Result<Box<dyn Command<Drawing>>, CommandError> {
    Ok(Box::new(cmd))
}

fn line(args: &[String]) -> Result<Box<dyn Command<Drawing>>, CommandError> {
    let from = point(args, 0, "from")?;
    let to = point(args, 1, "to")?;
    if from == to {
        return Err(CommandError::invalid_arg("to", "line needs two distinct points"));
    }
    boxed(AddShape::new(Shape::Line { from, to }))
}

fn circle(args: &[String]) -> Result<Box<dyn Command<Drawing>>, CommandError> {
    let center = point(args, 0, "center")?;
    let radius: f64 = arg(args, 1, "radius")?
        .parse()
        .map_err(|_| CommandError::invalid_arg("radius", "not a number"))?;
    if !(radius.is_finite() && radius > 0.0) {
        return Err(CommandError::invalid_arg("radius", "must be positive"));
    }
    boxed(AddShape::new(Shape::Circle { center, radius }))
}

fn rectangle(args: &[String]) -> Result<Box<dyn Command<Drawing>>, CommandError> {
    let corner = point(args, 0, "corner")?;
    let opposite = point(args, 1, "opposite")?;
    if corner.x == opposite.x || corner.y == opposite.y {
        return Err(CommandError::invalid_arg("opposite", "rectangle has zero area"));
    }
    boxed(AddShape::new(Shape::Rectangle { corner, opposite }))
}

fn erase(args: &[String]) -> Result<Box<dyn Command<Drawing>>, CommandError> {
    let raw = arg(args, 0, "id")?;
    let id: ShapeId = raw
        .parse()
        .map_err(|_| CommandError::invalid_arg("id", format!("'{raw}' is not a shape id")))?;
    boxed(EraseShape {
        metadata: CommandMetadata::new("erase").with_description(format!("erase {id}")),
        id,
        removed: None,
    })
}

fn list(_args: &[String]) -> Result<Box<dyn Command<Drawing>>, CommandError> {
    boxed(FnCommand::new("list", |doc: &mut Drawing, _| {
        for line in doc.listing() {
            doc.say(line);
        }
        Ok(())
    }))
}

/// Register the drafting commands and their aliases.
pub fn register_builtins(engine: &mut Engine<Drawing>) {
    engine.register_with_help("line", "line X1,Y1 X2,Y2 - draw a line segment", line);
    engine.register_with_help("circle", "circle CX,CY R - draw a circle", circle);
    engine.register_with_help(
        "rectangle",
        "rectangle X1,Y1 X2,Y2 - draw an axis-aligned rectangle",
        rectangle,
    );
    engine.register_with_help("erase", "erase ID - remove a shape", erase);
    engine.register_with_help("list", "list - print every shape", list);

    engine.register_alias("l", "line");
    engine.register_alias("c", "circle");
    engine.register_alias("rec", "rectangle");
    engine.register_alias("rect", "rectangle");
}
