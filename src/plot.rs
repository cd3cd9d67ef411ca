//! # Plot
//!
//! Renderer-independent description of the map, plus Plotly export.
//!
//! A [`Scene`] always carries the corpus as a uniform base layer. Only when a
//! query has been submitted does it carry an overlay: the query point, its
//! neighbours and one segment from the query to each neighbour. Corpus
//! positions come straight from the fitted layout, so adding or replacing the
//! overlay never moves them.
//!
//! [`Scene::to_plotly`] produces a Plotly figure (`data` traces + `layout`)
//! as JSON; [`Scene::to_html`] wraps it in a standalone page.
//!
//! ```rust
//! use embedding_atlas::plot::Scene;
//!
//! let scene = Scene::new(vec![[0.0, 0.0], [1.0, 1.0]], vec!["a".into(), "b".into()])
//!     .with_query("q", [0.5, 0.4], vec![[1.0, 1.0]]);
//! let fig = scene.to_plotly();
//! assert_eq!(fig["data"].as_array().unwrap().len(), 3);
//! ```

use serde_json::{Value, json};
use std::{fs, path::Path};
use tracing::info;

use crate::error::AtlasError;
use crate::layout::Layout;
use crate::session::QueryResult;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Query overlay: the projected query, its neighbours and the segments joining them.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub label: String,
    pub query: [f32; 2],
    pub neighbors: Vec<[f32; 2]>,
}

impl Overlay {
    /// `(from, to)` for each query→neighbour line.
    pub fn segments(&self) -> Vec<([f32; 2], [f32; 2])> {
        self.neighbors.iter().map(|n| (self.query, *n)).collect()
    }
}

/// What a renderer draws.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub points: Vec<[f32; 2]>,
    pub titles: Vec<String>,
    pub overlay: Option<Overlay>,
}

impl Scene {
    pub fn new(points: Vec<[f32; 2]>, titles: Vec<String>) -> Self {
        Self {
            points,
            titles,
            overlay: None,
        }
    }

    /// Base layer for a fitted layout.
    pub fn from_layout(layout: &Layout, titles: &[&str]) -> Self {
        Self::new(
            layout.points.clone(),
            titles.iter().map(|t| t.to_string()).collect(),
        )
    }

    pub fn with_query(mut self, label: &str, query: [f32; 2], neighbors: Vec<[f32; 2]>) -> Self {
        self.overlay = Some(Overlay {
            label: label.to_string(),
            query,
            neighbors,
        });
        self
    }

    /// Overlay a search result on this scene.
    pub fn with_result(self, result: &QueryResult) -> Self {
        let neighbors = result.neighbors.iter().map(|n| n.point).collect();
        self.with_query(&result.text, result.point, neighbors)
    }

    /// Axis-aligned bounds `(min, max)` over every drawn point.
    pub fn bounds(&self) -> Option<([f32; 2], [f32; 2])> {
        let overlay_points = self
            .overlay
            .iter()
            .flat_map(|o| std::iter::once(o.query).chain(o.neighbors.iter().copied()));
        self.points
            .iter()
            .copied()
            .chain(overlay_points)
            .fold(None, |acc, p| match acc {
                None => Some((p, p)),
                Some((lo, hi)) => Some((
                    [lo[0].min(p[0]), lo[1].min(p[1])],
                    [hi[0].max(p[0]), hi[1].max(p[1])],
                )),
            })
    }

    /// Plotly figure: "Articles", and with a query also "Query", "Neighbors"
    /// and one line shape per neighbour.
    pub fn to_plotly(&self) -> Value {
        let xs: Vec<f32> = self.points.iter().map(|p| p[0]).collect();
        let ys: Vec<f32> = self.points.iter().map(|p| p[1]).collect();

        let mut data = vec![json!({
            "type": "scatter",
            "x": xs,
            "y": ys,
            "mode": "markers",
            "marker": { "color": "blue", "size": 5, "opacity": 0.6 },
            "text": self.titles,
            "hoverinfo": "text",
            "name": "Articles",
        })];
        let mut shapes = Vec::new();

        if let Some(overlay) = &self.overlay {
            data.push(json!({
                "type": "scatter",
                "x": [overlay.query[0]],
                "y": [overlay.query[1]],
                "mode": "markers",
                "marker": { "color": "red", "size": 15, "symbol": "star" },
                "text": [overlay.label],
                "name": "Query",
            }));
            data.push(json!({
                "type": "scatter",
                "x": overlay.neighbors.iter().map(|p| p[0]).collect::<Vec<_>>(),
                "y": overlay.neighbors.iter().map(|p| p[1]).collect::<Vec<_>>(),
                "mode": "markers",
                "marker": { "color": "green", "size": 10, "symbol": "circle" },
                "name": "Neighbors",
            }));
            for (from, to) in overlay.segments() {
                shapes.push(json!({
                    "type": "line",
                    "x0": from[0], "y0": from[1],
                    "x1": to[0], "y1": to[1],
                    "line": { "color": "rgba(0,0,0,0.3)", "width": 1 },
                }));
            }
        }

        json!({
            "data": data,
            "layout": {
                "title": { "text": "2D Visualization of Article Vectors" },
                "xaxis": { "title": { "text": "Dimension 1" } },
                "yaxis": { "title": { "text": "Dimension 2" } },
                "showlegend": true,
                "shapes": shapes,
            },
        })
    }

    /// Standalone HTML page rendering the Plotly figure.
    pub fn to_html(&self) -> String {
        let figure = self.to_plotly();
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Vector Search Visualization</title>
<script src="{PLOTLY_CDN}"></script>
</head>
<body>
<div id="atlas" style="width:100%;height:90vh;"></div>
<script>
const fig = {figure};
Plotly.newPlot("atlas", fig.data, fig.layout, {{responsive: true}});
</script>
</body>
</html>
"#
        )
    }

    /// Write the figure to `path`: HTML for `.html`/`.htm`, Plotly JSON otherwise.
    pub fn export(&self, path: &Path) -> Result<(), AtlasError> {
        let is_html = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));

        let body = if is_html {
            self.to_html()
        } else {
            serde_json::to_string_pretty(&self.to_plotly())
                .map_err(|e| AtlasError::Config(e.to_string()))?
        };
        fs::write(path, body)?;
        info!("plot written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn base() -> Scene {
        Scene::new(
            vec![[0.0, 0.0], [2.0, 1.0], [4.0, -1.0]],
            vec!["a".into(), "b".into(), "c".into()],
        )
    }

    #[test]
    fn test_base_layer_only() {
        let fig = base().to_plotly();
        let data = fig["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"], "Articles");
        assert_eq!(data[0]["text"][2], "c");
        assert!(fig["layout"]["shapes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_query_overlay() {
        let scene = base().with_query("q", [1.0, 0.5], vec![[0.0, 0.0], [2.0, 1.0]]);
        let fig = scene.to_plotly();
        let data = fig["data"].as_array().unwrap();
        let names: Vec<&str> = data.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Articles", "Query", "Neighbors"]);
        assert_eq!(data[1]["marker"]["symbol"], "star");

        let shapes = fig["layout"]["shapes"].as_array().unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[1]["x1"], 2.0);
        assert_eq!(shapes[1]["x0"], 1.0);
    }

    #[test]
    fn test_overlay_keeps_corpus_points() {
        let plain = base();
        let with_query = plain.clone().with_query("q", [9.0, 9.0], vec![[4.0, -1.0]]);
        assert_eq!(plain.points, with_query.points);
    }

    #[test]
    fn test_bounds_include_overlay() {
        let scene = base().with_query("q", [9.0, -3.0], vec![]);
        let (lo, hi) = scene.bounds().unwrap();
        assert_eq!(lo, [0.0, -3.0]);
        assert_eq!(hi, [9.0, 1.0]);
        assert!(Scene::new(vec![], vec![]).bounds().is_none());
    }

    #[test]
    fn test_export_html_and_json() {
        let dir = tempdir().unwrap();
        let scene = base();

        let html = dir.path().join("map.html");
        scene.export(&html).unwrap();
        let page = fs::read_to_string(&html).unwrap();
        assert!(page.contains("Plotly.newPlot"));
        assert!(page.contains("Articles"));

        let json_path = dir.path().join("map.json");
        scene.export(&json_path).unwrap();
        let fig: Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(fig["layout"]["xaxis"]["title"]["text"], "Dimension 1");
    }
}
