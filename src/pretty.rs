//! # Pretty Printing - Terminal Map and Ranked Results
//!
//! Draws a [`Scene`] straight into the terminal and prints the ranked
//! neighbour list under it.
//!
//! ## Overview
//!
//! Rendering is split in two so the layout logic can be tested without a TTY:
//!
//! 1. **[`rasterize()`]**: maps scene coordinates onto a character grid
//!    ([`Canvas`]), pure and deterministic.
//! 2. **[`print_canvas()`]** / **[`print_scene()`]**: emit that grid with
//!    Crossterm colours to any `Write`.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ ·   ·  ·                                 │   ·  article   (blue)
//! │   ·  ●∙∙∙∙∙★        ·  ·                 │   ●  neighbour (green)
//! │  ·    ·   ∙∙●     ·     ·   ·            │   ★  query     (red)
//! │        ·        ·      ·                 │   ∙  segment   (grey)
//! └──────────────────────────────────────────┘
//! ```
//!
//! When several things fall into the same cell the most important one wins:
//! query over neighbour over article over segment.
//!
//! ## Example
//!
//! ```no_run
//! use embedding_atlas::plot::Scene;
//! use embedding_atlas::pretty::print_scene;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scene = Scene::new(vec![[0.0, 0.0], [3.0, 2.0]], vec!["a".into(), "b".into()])
//!     .with_query("q", [1.0, 1.0], vec![[0.0, 0.0]]);
//! print_scene(&scene, 60, 20, &mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

use crossterm::{
    ExecutableCommand,
    style::{Attribute, Color, SetAttribute, SetForegroundColor},
};
use std::error::Error;
use std::io::Write;

use crate::plot::Scene;
use crate::session::QueryResult;

/// What occupies a grid cell, in increasing draw priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mark {
    Empty,
    Segment,
    Article,
    Neighbor,
    Query,
}

impl Mark {
    pub fn glyph(self) -> char {
        match self {
            Mark::Empty => ' ',
            Mark::Segment => '∙',
            Mark::Article => '·',
            Mark::Neighbor => '●',
            Mark::Query => '★',
        }
    }

    fn color(self) -> Color {
        match self {
            Mark::Empty => Color::Reset,
            Mark::Segment => Color::DarkGrey,
            Mark::Article => Color::Blue,
            Mark::Neighbor => Color::Green,
            Mark::Query => Color::Red,
        }
    }
}

/// A `width × height` grid of marks, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    cells: Vec<Mark>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Mark::Empty; width * height],
        }
    }

    pub fn get(&self, col: usize, row: usize) -> Mark {
        self.cells[row * self.width + col]
    }

    fn put(&mut self, col: usize, row: usize, mark: Mark) {
        let cell = &mut self.cells[row * self.width + col];
        if mark > *cell {
            *cell = mark;
        }
    }

    /// Number of cells holding `mark`.
    pub fn count(&self, mark: Mark) -> usize {
        self.cells.iter().filter(|m| **m == mark).count()
    }

    /// The grid as plain text, one line per row, no colours.
    pub fn to_plain_string(&self) -> String {
        self.cells
            .chunks(self.width)
            .map(|row| row.iter().map(|m| m.glyph()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Map a scene onto a character grid.
///
/// Coordinates are scaled to the scene bounds; y grows upwards.
pub fn rasterize(scene: &Scene, width: usize, height: usize) -> Canvas {
    let (width, height) = (width.max(2), height.max(2));
    let mut canvas = Canvas::new(width, height);
    let Some((lo, hi)) = scene.bounds() else {
        return canvas;
    };

    let span_x = (hi[0] - lo[0]).max(f32::EPSILON);
    let span_y = (hi[1] - lo[1]).max(f32::EPSILON);
    let to_cell = |p: [f32; 2]| -> (usize, usize) {
        let col = ((p[0] - lo[0]) / span_x * (width - 1) as f32).round() as usize;
        let row = ((hi[1] - p[1]) / span_y * (height - 1) as f32).round() as usize;
        (col.min(width - 1), row.min(height - 1))
    };

    if let Some(overlay) = &scene.overlay {
        for (from, to) in overlay.segments() {
            for (col, row) in line_cells(to_cell(from), to_cell(to)) {
                canvas.put(col, row, Mark::Segment);
            }
        }
    }
    for p in &scene.points {
        let (col, row) = to_cell(*p);
        canvas.put(col, row, Mark::Article);
    }
    if let Some(overlay) = &scene.overlay {
        for p in &overlay.neighbors {
            let (col, row) = to_cell(*p);
            canvas.put(col, row, Mark::Neighbor);
        }
        let (col, row) = to_cell(overlay.query);
        canvas.put(col, row, Mark::Query);
    }
    canvas
}

/// Bresenham cells from `a` to `b`, both ends included.
fn line_cells(a: (usize, usize), b: (usize, usize)) -> Vec<(usize, usize)> {
    let (mut x, mut y) = (a.0 as i64, a.1 as i64);
    let (x1, y1) = (b.0 as i64, b.1 as i64);
    let (dx, dy) = ((x1 - x).abs(), -(y1 - y).abs());
    let (sx, sy) = (if x < x1 { 1 } else { -1 }, if y < y1 { 1 } else { -1 });
    let mut err = dx + dy;
    let mut cells = Vec::new();
    loop {
        cells.push((x as usize, y as usize));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    cells
}

/// Print a canvas with colours, framed by a box.
pub fn print_canvas<W: Write>(canvas: &Canvas, out: &mut W) -> Result<(), Box<dyn Error>> {
    writeln!(out, "┌{}┐", "─".repeat(canvas.width))?;
    for row in 0..canvas.height {
        write!(out, "│")?;
        let mut current = Mark::Empty;
        for col in 0..canvas.width {
            let mark = canvas.get(col, row);
            if mark != current {
                out.execute(SetForegroundColor(mark.color()))?;
                current = mark;
            }
            write!(out, "{}", mark.glyph())?;
        }
        out.execute(SetForegroundColor(Color::Reset))?;
        writeln!(out, "│")?;
    }
    writeln!(out, "└{}┘", "─".repeat(canvas.width))?;
    out.flush()?;
    Ok(())
}

/// Rasterize and print a scene.
pub fn print_scene<W: Write>(
    scene: &Scene,
    width: usize,
    height: usize,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    print_canvas(&rasterize(scene, width, height), out)
}

fn print_header<W: Write>(text: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    out.execute(SetForegroundColor(Color::Cyan))?;
    out.execute(SetAttribute(Attribute::Bold))?;
    writeln!(out, "{text}")?;
    out.execute(SetAttribute(Attribute::Reset))?;
    out.execute(SetForegroundColor(Color::Reset))?;
    Ok(())
}

/// Print the neighbours of a query, nearest first.
pub fn print_ranked<W: Write>(result: &QueryResult, out: &mut W) -> Result<(), Box<dyn Error>> {
    print_header(&format!("Closest articles to \"{}\"", result.text), out)?;
    for (rank, n) in result.neighbors.iter().enumerate() {
        write!(out, "{:>3}. ", rank + 1)?;
        out.execute(SetForegroundColor(Color::Green))?;
        write!(out, "{}", n.title)?;
        out.execute(SetForegroundColor(Color::DarkGrey))?;
        writeln!(out, "  (distance {:.4})", n.distance)?;
        out.execute(SetForegroundColor(Color::Reset))?;
    }
    out.flush()?;
    Ok(())
}

/// Print a one-line title above a map.
pub fn print_title<W: Write>(text: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    print_header(text, out)
}

/// Yellow warning line on stderr-style output.
pub fn print_warning<W: Write>(text: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    out.execute(SetForegroundColor(Color::Yellow))?;
    writeln!(out, "warning: {text}")?;
    out.execute(SetForegroundColor(Color::Reset))?;
    Ok(())
}

/// Red error line.
pub fn print_error<W: Write>(text: &str, out: &mut W) -> Result<(), Box<dyn Error>> {
    out.execute(SetForegroundColor(Color::Red))?;
    out.execute(SetAttribute(Attribute::Bold))?;
    writeln!(out, "error: {text}")?;
    out.execute(SetAttribute(Attribute::Reset))?;
    out.execute(SetForegroundColor(Color::Reset))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Neighbor;

    fn scene() -> Scene {
        Scene::new(
            vec![[0.0, 0.0], [10.0, 10.0], [10.0, 0.0]],
            vec!["a".into(), "b".into(), "c".into()],
        )
    }

    #[test]
    fn test_rasterize_corners() {
        let canvas = rasterize(&scene(), 11, 11);
        assert_eq!(canvas.get(0, 10), Mark::Article);
        assert_eq!(canvas.get(10, 0), Mark::Article);
        assert_eq!(canvas.get(10, 10), Mark::Article);
        assert_eq!(canvas.count(Mark::Article), 3);
        assert_eq!(canvas.count(Mark::Query), 0);
    }

    #[test]
    fn test_query_wins_over_article() {
        let s = scene().with_query("q", [0.0, 0.0], vec![[10.0, 10.0]]);
        let canvas = rasterize(&s, 11, 11);
        assert_eq!(canvas.get(0, 10), Mark::Query);
        assert_eq!(canvas.get(10, 0), Mark::Neighbor);
        // the diagonal between them is a segment
        assert_eq!(canvas.get(5, 5), Mark::Segment);
        assert_eq!(canvas.count(Mark::Segment), 9);
    }

    #[test]
    fn test_empty_scene_is_blank() {
        let canvas = rasterize(&Scene::new(vec![], vec![]), 4, 3);
        assert_eq!(canvas.to_plain_string(), "    \n    \n    ");
    }

    #[test]
    fn test_line_cells_endpoints() {
        let cells = line_cells((0, 0), (3, 1));
        assert_eq!(cells.first(), Some(&(0, 0)));
        assert_eq!(cells.last(), Some(&(3, 1)));
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_print_scene_frames_output() {
        let mut buf = Vec::new();
        print_scene(&scene(), 8, 4, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("┌────────┐"));
        assert!(text.contains('·'));
    }

    #[test]
    fn test_print_ranked_lists_titles() {
        let result = QueryResult {
            text: "rust".into(),
            embedding: vec![0.0],
            point: [0.0, 0.0],
            neighbors: vec![
                Neighbor {
                    index: 2,
                    title: "Ownership".into(),
                    distance: 0.5,
                    point: [1.0, 1.0],
                },
                Neighbor {
                    index: 0,
                    title: "Borrowing".into(),
                    distance: 0.75,
                    point: [2.0, 2.0],
                },
            ],
        };
        let mut buf = Vec::new();
        print_ranked(&result, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first = text.find("Ownership").unwrap();
        let second = text.find("Borrowing").unwrap();
        assert!(first < second);
        assert!(text.contains("  1. "));
    }
}
