// THEORY:
// The renderer is a read-only consumer of one pipeline run. It paints, back
// to front:
// 1.  **Detector**: every module as a filled tile with a black edge, then the
//     sampling region as a translucent red wash. Crescent mode skips both so
//     only the logic remains.
// 2.  **Logic**: the members of every cluster, in cluster order. With color
//     overlap on, shared modules take their blended color; otherwise each
//     cluster paints its base color and later clusters cover earlier ones.
// 3.  **Nodes**: a small disc on every sampling node.
// 4.  **Boundaries**: the outline segments of every cluster.
// 5.  **Labels**: module ids and node indices.

use crate::canvas::{Canvas, label_font};
use crate::view_state::ViewState;
use ecal_trigger::core_modules::colorizer::Rgba as Color;
use ecal_trigger::core_modules::module::{Bounds, Module, ModuleTable};
use ecal_trigger::pipeline::PipelineOutput;
use image::RgbaImage;
use tracing::{debug, warn};

pub const BACKGROUND: Color = Color::rgb(255, 255, 255);
pub const MODULE_FILL: Color = Color::rgb(166, 176, 16);
pub const MODULE_EDGE: Color = Color::rgb(0, 0, 0);
pub const REGION_WASH: Color = Color::rgba(255, 0, 0, 25);
pub const NODE_FILL: Color = Color::rgb(36, 23, 115);
pub const NODE_LABEL: Color = Color::rgb(255, 255, 255);
pub const MODULE_LABEL: Color = Color::rgb(0, 0, 0);
/// Node disc radius in mm.
pub const NODE_RADIUS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Pixels per mm.
    pub scale: f64,
    pub margin: u32,
    /// Label text height in pixels.
    pub label_size: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            margin: 20,
            label_size: 12.0,
        }
    }
}

/// What one picture is made of.
pub struct Scene<'a> {
    pub table: &'a ModuleTable,
    pub output: &'a PipelineOutput,
}

impl Scene<'_> {
    /// Dimensions of the picture `render` draws for this scene.
    pub fn image_size(&self, options: &RenderOptions) -> (u64, u64) {
        let frame = self.frame();
        let margin = 2 * u64::from(options.margin);
        let side = |mm: f64| ((mm * options.scale).ceil().max(0.0) as u64).saturating_add(margin).max(1);
        (side(frame.width()), side(frame.height()))
    }

    /// The sampling region, or the module extent if no lattice was laid.
    fn frame(&self) -> Bounds {
        self.output
            .nodes
            .region
            .or_else(|| self.table.bounds())
            .unwrap_or(Bounds {
                min_x: 0.0,
                max_x: 0.0,
                min_y: 0.0,
                max_y: 0.0,
            })
    }
}

pub fn render(scene: &Scene<'_>, view: &ViewState, options: &RenderOptions) -> RgbaImage {
    let frame = scene.frame();
    let mut canvas = Canvas::covering(frame, options.scale, options.margin, BACKGROUND);
    let output = scene.output;

    // --- 1. Detector ---
    if !view.show_crescent_mode {
        for module in scene.table.iter() {
            canvas.fill_square(module.center, module.size, MODULE_FILL);
            canvas.outline_square(module.center, module.size, MODULE_EDGE);
        }
        if let Some(region) = output.nodes.region {
            canvas.blend_rect(region, REGION_WASH);
        }
    }

    // --- 2. Logic ---
    for (index, cluster) in output.clusters.iter().enumerate() {
        let Some(colors) = output.colors.cluster(index) else {
            continue;
        };
        for module in cluster.members() {
            let color = if view.show_color_overlap {
                colors.color_of(module.id).unwrap_or(colors.base)
            } else {
                colors.base
            };
            canvas.fill_square(module.center, module.size, color);
            canvas.outline_square(module.center, module.size, MODULE_EDGE);
        }
    }

    // --- 3. Nodes ---
    for node in output.nodes() {
        canvas.disc(node.position, NODE_RADIUS, NODE_FILL);
    }

    // --- 4. Boundaries ---
    if view.show_boundaries {
        for outline in output.outlines() {
            for segment in &outline.segments {
                canvas.line(segment.start, segment.end, segment.color);
            }
        }
    }

    // --- 5. Labels ---
    if view.show_module_index || view.show_node_index {
        match label_font() {
            Ok(font) => {
                if view.show_module_index {
                    let labelled: Vec<&Module> = if view.show_crescent_mode {
                        output
                            .clusters
                            .covered_modules()
                            .iter()
                            .filter_map(|id| scene.table.get(*id))
                            .collect()
                    } else {
                        scene.table.iter().collect()
                    };
                    for module in labelled {
                        canvas.label(module.center, &module.id.to_string(), &font, options.label_size, MODULE_LABEL);
                    }
                }
                if view.show_node_index {
                    for node in output.nodes() {
                        canvas.label(node.position, &node.index.to_string(), &font, options.label_size, NODE_LABEL);
                    }
                }
            }
            Err(error) => warn!(%error, "label font unavailable, drawing without labels"),
        }
    }

    debug!(
        width = canvas.width(),
        height = canvas.height(),
        clusters = output.clusters.len(),
        "scene rendered"
    );
    canvas.into_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::to_pixel_color;
    use crate::view_state::ViewToggle;
    use ecal_trigger::core_modules::colorizer::LOGIC_PALETTE;
    use ecal_trigger::core_modules::module::{Point, SizeClass};
    use ecal_trigger::{AnchorSelection, PipelineConfig, TriggerPipeline};
    use image::Rgba;

    fn grid() -> ModuleTable {
        (0..100u32)
            .map(|i| {
                Module::new(
                    i,
                    Point::new(f64::from(i % 10) * 42.0, f64::from(i / 10) * 42.0),
                    SizeClass::S42,
                )
            })
            .collect()
    }

    fn run(table: &ModuleTable, anchors: Vec<usize>) -> PipelineOutput {
        let config = PipelineConfig {
            anchors: AnchorSelection::Explicit { indices: anchors },
            ..PipelineConfig::default()
        };
        TriggerPipeline::new(config).expect("valid config").run(table).expect("pipeline runs")
    }

    fn draw(table: &ModuleTable, output: &PipelineOutput, toggles: &[ViewToggle]) -> RgbaImage {
        render(&Scene { table, output }, &ViewState::with(toggles), &RenderOptions::default())
    }

    // The sampling region starts at (-19.5, -20) and the margin is 20 px at 1 px/mm.
    fn pixel_of(x: f64, y: f64) -> (u32, u32) {
        ((x + 39.5) as u32, (y + 40.0) as u32)
    }

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn image_covers_region_and_margin() {
        let table = grid();
        let output = run(&table, vec![0]);
        let image = draw(&table, &output, &[]);
        assert_eq!(image.dimensions(), (457, 458));

        let scene = Scene { table: &table, output: &output };
        assert_eq!(scene.image_size(&RenderOptions::default()), (457, 458));
        let huge = RenderOptions {
            scale: 1e12,
            ..RenderOptions::default()
        };
        let (width, height) = scene.image_size(&huge);
        assert!(width > u64::from(u32::MAX) && height > u64::from(u32::MAX));
    }

    #[test]
    fn clusters_paint_over_tinted_detector() {
        let table = grid();
        let output = run(&table, vec![0]);
        let image = draw(&table, &output, &[]);

        let (x, y) = pixel_of(42.0, 42.0);
        assert_eq!(image.get_pixel(x, y), &to_pixel_color(LOGIC_PALETTE[0]));

        // A tile outside the cluster keeps the module fill under the red wash.
        let (x, y) = pixel_of(378.0, 378.0);
        let tile = image.get_pixel(x, y);
        assert_ne!(tile, &WHITE);
        assert!(tile[0] > tile[1] && tile[2] < 50);

        let (x, y) = pixel_of(126.0, 126.0);
        assert_eq!(image.get_pixel(x, y), &to_pixel_color(NODE_FILL));
    }

    #[test]
    fn crescent_mode_hides_the_detector() {
        let table = grid();
        let output = run(&table, vec![0]);
        let image = draw(&table, &output, &[ViewToggle::CrescentMode]);
        let (x, y) = pixel_of(378.0, 378.0);
        assert_eq!(image.get_pixel(x, y), &WHITE);
        let (x, y) = pixel_of(42.0, 42.0);
        assert_eq!(image.get_pixel(x, y), &to_pixel_color(LOGIC_PALETTE[0]));
    }

    #[test]
    fn color_overlap_blends_shared_tiles() {
        let table = grid();
        let output = run(&table, vec![0, 1]);
        let (x, y) = pixel_of(210.0, 42.0);

        let plain = draw(&table, &output, &[]);
        assert_eq!(plain.get_pixel(x, y), &to_pixel_color(LOGIC_PALETTE[1]));

        let blended = draw(&table, &output, &[ViewToggle::ColorOverlap]);
        assert_eq!(
            blended.get_pixel(x, y),
            &to_pixel_color(LOGIC_PALETTE[0] + LOGIC_PALETTE[1])
        );
    }

    #[test]
    fn boundaries_draw_the_outline() {
        let table = grid();
        let output = run(&table, vec![0, 1]);
        // Cluster 1 is shifted by 1 mm, so its top edge runs along y = -22 in the margin.
        let (x, y) = pixel_of(252.0, -22.0);

        assert_eq!(draw(&table, &output, &[]).get_pixel(x, y), &WHITE);
        let outlined = draw(&table, &output, &[ViewToggle::Boundaries]);
        assert_eq!(outlined.get_pixel(x, y), &Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn labels_change_the_picture() {
        let table = grid();
        let output = run(&table, vec![0, 3]);
        let plain = draw(&table, &output, &[]);
        assert_ne!(plain, draw(&table, &output, &[ViewToggle::NodeIndex]));
        assert_ne!(plain, draw(&table, &output, &[ViewToggle::ModuleIndex]));
    }
}
