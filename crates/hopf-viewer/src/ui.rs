//! Parameter panel.

use crate::sim::SimulationParams;
use hopf_geom::curves::BaseCurve;

const MAX_FIBERS: u32 = 2000;
const MAX_RESOLUTION: u32 = 1000;
const MAX_DETAIL: u32 = 32;

/// Read-only figures shown at the top of the panel.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanelStats {
    pub frame_time: f32,
    pub tube_vertices: u64,
    pub camera_attached: bool,
    /// Most fibers the device holds at the current resolution and detail.
    pub max_fibers: u32,
}

/// Upper end of the fiber slider.
fn fiber_slider_max(stats: &PanelStats) -> u32 {
    stats.max_fibers.clamp(1, MAX_FIBERS)
}

/// Draws the parameter window pinned at `pos` (logical pixels) with the
/// given `width`. Edits go into `params`; returns whether anything changed.
pub fn draw_params_panel(
    ctx: &egui::Context,
    params: &mut SimulationParams,
    stats: PanelStats,
    pos: egui::Pos2,
    width: f32,
) -> bool {
    let before = params.clone();

    egui::Window::new("Parameters")
        .fixed_pos(pos)
        .default_width(width)
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            ui.label(format!(
                "Frame: {:.2} ms ({:.0} FPS)",
                stats.frame_time * 1000.0,
                1.0 / stats.frame_time.max(1e-6)
            ));
            ui.label(format!("Tube vertices: {}", stats.tube_vertices));
            ui.label(if stats.camera_attached {
                "WASD / Space / Shift to move, mouse to look, Esc to release"
            } else {
                "Click a viewport to take control of its camera"
            });
            ui.separator();

            egui::Grid::new("params_grid").num_columns(2).show(ui, |ui| {
                ui.label("Base curve");
                egui::ComboBox::from_id_source("base_curve")
                    .selected_text(params.base_curve.label())
                    .show_ui(ui, |ui| {
                        for curve in BaseCurve::ALL {
                            ui.selectable_value(&mut params.base_curve, curve, curve.label());
                        }
                    });
                ui.end_row();

                ui.label("Fibers");
                ui.add(egui::Slider::new(&mut params.fiber_count, 1..=fiber_slider_max(&stats)).logarithmic(true));
                ui.end_row();

                ui.label("Visible fibers");
                ui.add(egui::Slider::new(&mut params.visible_fibers, 0..=params.fiber_count));
                ui.end_row();

                ui.label("Resolution");
                ui.add(egui::Slider::new(&mut params.fiber_resolution, 3..=MAX_RESOLUTION));
                ui.end_row();

                ui.label("Line detail");
                ui.add(egui::Slider::new(&mut params.line_detail, 3..=MAX_DETAIL));
                ui.end_row();

                ui.label("Line radius");
                ui.add(egui::Slider::new(&mut params.line_radius, 0.001..=0.1).logarithmic(true));
                ui.end_row();

                ui.label("Animation speed");
                ui.add(egui::Slider::new(&mut params.anim_speed, 0.0..=5.0));
                ui.end_row();
            });

            ui.separator();
            ui.horizontal(|ui| {
                ui.checkbox(&mut params.draw_mesh, "Tubes");
                ui.checkbox(&mut params.draw_lines, "Lines");
                ui.checkbox(&mut params.draw_points, "Base points");
            });
        });

    params.visible_fibers = params.visible_fibers.min(params.fiber_count);
    *params != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fiber_slider_follows_the_device_limit() {
        let stats = |max_fibers| PanelStats {
            max_fibers,
            ..Default::default()
        };
        assert_eq!(fiber_slider_max(&stats(349)), 349);
        assert_eq!(fiber_slider_max(&stats(65_535)), MAX_FIBERS);
        assert_eq!(fiber_slider_max(&stats(0)), 1);
    }
}
