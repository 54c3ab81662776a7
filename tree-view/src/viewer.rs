//! Interactive 3D space-colonization tree viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns the simulation state
//! (tree, configuration, seed, camera) and implements [`eframe::App`]
//! to render and control the growth through an egui UI. The skeleton is
//! drawn with an orbiting orthographic projection onto the egui painter.

use eframe::App;
use glam::{Quat, Vec2, Vec3};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::f32::consts::PI;
use tree_core::{
    Config, IndexFormat, IndexedMesh, Mesh, Tree, TreeError, frames::frame_lines,
    types::NodeId,
};

/// Vertex counts of the last meshing pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MeshStats {
    corners: usize,
    welded: usize,
    triangles: usize,
}

/// Main application state for the interactive viewer.
///
/// [`Viewer`] glues together:
/// - The growth engine: [`Tree`] built from [`Config`] and a seed.
/// - Camera state (yaw/pitch orbit, zoom, pan) and display toggles.
/// - eframe/egui callbacks for drawing and user interaction.
///
/// ### Fields
/// - `tree` - Current tree being grown.
/// - `cfg` - Configuration edited in the side panel; applied on reset.
/// - `seed` - Seed for the attraction point cloud.
///
/// - `running` - Whether growth is currently auto-advancing.
/// - `finished` - Whether tip ends and depths have been added.
/// - `zoom`, `pan`, `yaw`, `pitch` - Camera.
///
/// - `last_new_ids` - Node ids created in the last step (for highlighting).
/// - `mesh_stats` - Result of the last "Mesh" action.
/// - `error` - Last configuration or meshing error, shown in the status bar.
pub struct Viewer {
    tree: Tree,
    cfg: Config,
    seed: u64,

    running: bool,
    finished: bool,
    zoom: f32,
    pan: egui::Vec2,
    yaw: f32,
    pitch: f32,

    show_frames: bool,
    show_attractors: bool,

    last_new_ids: Vec<NodeId>,
    mesh_stats: Option<MeshStats>,
    error: Option<String>,

    step_interval: f64,
    last_step_time: f64,
    last_step_dt: f64,
}

fn build_tree(cfg: Config, seed: u64) -> Result<Tree, TreeError> {
    Tree::new(cfg, &mut Pcg64::seed_from_u64(seed))
}

impl Viewer {
    /// Creates a viewer holding a freshly seeded, ungrown tree.
    pub fn new(cfg: Config, seed: u64) -> Result<Self, TreeError> {
        let tree = build_tree(cfg, seed)?;

        Ok(Self {
            tree,
            cfg,
            seed,
            running: false,
            finished: false,
            zoom: 0.8,
            pan: egui::vec2(0.0, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            show_frames: false,
            show_attractors: true,
            last_new_ids: Vec::with_capacity(16),
            mesh_stats: None,
            error: None,
            step_interval: 0.1,
            last_step_time: 0.0,
            last_step_dt: 0.0,
        })
    }

    /// Rebuilds the tree from the current config and seed.
    ///
    /// On an invalid config the old tree is kept and the error is shown.
    fn reset(&mut self) {
        match build_tree(self.cfg, self.seed) {
            Ok(tree) => {
                self.tree = tree;
                self.error = None;
            }
            Err(e) => {
                tracing::warn!("Reset rejected: {}", e);
                self.error = Some(e.to_string());
            }
        }
        self.last_new_ids.clear();
        self.mesh_stats = None;
        self.finished = false;
        self.running = false;
    }

    /// Advances growth by a single step.
    fn step_once(&mut self) {
        if self.finished {
            self.running = false;
            return;
        }
        self.last_new_ids = self.tree.grow();
        if self.tree.is_finished() || self.last_new_ids.is_empty() {
            self.running = false;
        }
    }

    /// Caps the tips and assigns depths. Growth stops afterwards.
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.tree.add_ends();
        self.tree.calculate_depth();
        self.finished = true;
        self.running = false;
        self.last_new_ids.clear();
    }

    /// Meshes the current tree and records the vertex counts.
    fn build_mesh(&mut self) {
        let mesh = Mesh::from_tree(&self.tree);
        match IndexedMesh::weld(&mesh, self.cfg.weld_epsilon, IndexFormat::U32) {
            Ok(welded) => {
                self.mesh_stats = Some(MeshStats {
                    corners: mesh.vertex_count(),
                    welded: welded.vertices.len(),
                    triangles: welded.triangle_count(),
                });
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn view_rotation(&self) -> Quat {
        Quat::from_rotation_x(self.pitch) * Quat::from_rotation_y(self.yaw)
    }

    /// Rotates a world point into view space around the crown's base.
    fn project(&self, p: Vec3) -> Vec2 {
        let target = self.cfg.root_position.lerp(self.cfg.crown_center, 0.5);
        let v = self.view_rotation() * (p - target);
        Vec2::new(v.x, v.y)
    }

    /// Converts a view-plane position to screen-space. The y-axis is
    /// flipped so that positive y goes up.
    fn view_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y - p.y * self.zoom + self.pan.y,
        )
    }

    /// Inverse of [`Viewer::view_to_screen`].
    fn screen_to_view(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        let x = (p.x - center.x - self.pan.x) / self.zoom;
        let y = (center.y - p.y + self.pan.y) / self.zoom;
        Vec2::new(x, y)
    }

    fn world_to_screen(&self, p: Vec3, rect: egui::Rect) -> egui::Pos2 {
        self.view_to_screen(self.project(p), rect)
    }

    /// Helper to draw a labeled `usize` [`egui::DragValue`].
    fn labeled_drag_usize(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut usize,
        range: std::ops::RangeInclusive<usize>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Helper to draw a labeled `f32` [`egui::DragValue`].
    fn labeled_drag_f32(
        ui: &mut egui::Ui,
        label: &str,
        value: &mut f32,
        range: std::ops::RangeInclusive<f32>,
        speed: f64,
    ) {
        ui.horizontal(|ui| {
            ui.label(label);
            ui.add(egui::DragValue::new(value).range(range).speed(speed));
        });
    }

    /// Builds the top panel UI (run controls, stepping, camera).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .button(if self.running { "⏸ Pause" } else { "▶ Run" })
                    .clicked()
                {
                    self.running = !self.running;
                }

                ui.add(
                    egui::DragValue::new(&mut self.step_interval)
                        .prefix("dt target = ")
                        .range(0.01..=1.0)
                        .speed(0.01),
                );

                if ui.button("Step").clicked() {
                    let now = ctx.input(|i| i.time);
                    if self.last_step_time > 0.0 {
                        self.last_step_dt = now - self.last_step_time;
                    }
                    self.step_once();
                    self.last_step_time = now;
                }

                if ui.button("Finish").clicked() {
                    self.finish();
                }

                if ui.button("Mesh").clicked() {
                    self.build_mesh();
                }

                if ui.button("Reset").clicked() {
                    self.reset();
                }

                if ui.button("New seed").clicked() {
                    self.seed = self.seed.wrapping_add(1);
                    self.reset();
                }

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 0.05..=10.0).text("Zoom"));
                ui.add(egui::Slider::new(&mut self.yaw, -PI..=PI).text("Yaw"));
                ui.add(egui::Slider::new(&mut self.pitch, -1.5..=1.5).text("Pitch"));
            });
        });
    }

    /// Builds the bottom status bar.
    fn ui_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("dt target = {:.3} s", self.step_interval));
                ui.label(format!("dt last = {:.3} s", self.last_step_dt));
                ui.separator();
                ui.label(format!("seed = {}", self.seed));
                ui.label(format!("nodes = {}", self.tree.len()));
                ui.label(format!("attractors = {}", self.tree.attractors.len()));
                if let Some(stats) = self.mesh_stats {
                    ui.separator();
                    ui.label(format!(
                        "mesh: {} corners, {} welded, {} tris",
                        stats.corners, stats.welded, stats.triangles
                    ));
                }
                if let Some(err) = &self.error {
                    ui.separator();
                    ui.colored_label(egui::Color32::LIGHT_RED, err);
                }
            });
        });
    }

    /// Builds the right-hand configuration panel.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.heading("Config");
                ui.label("Applied on reset.");

                ui.separator();
                ui.label("Attraction points");
                Self::labeled_drag_usize(
                    ui,
                    "count:",
                    &mut self.cfg.attractor_count,
                    1..=5000,
                    1.0,
                );
                Self::labeled_drag_f32(ui, "crown y:", &mut self.cfg.crown_center.y, 0.0..=2000.0, 1.0);
                Self::labeled_drag_f32(ui, "radius x:", &mut self.cfg.crown_radii.x, 1.0..=1000.0, 1.0);
                Self::labeled_drag_f32(ui, "radius y:", &mut self.cfg.crown_radii.y, 1.0..=1000.0, 1.0);
                Self::labeled_drag_f32(ui, "radius z:", &mut self.cfg.crown_radii.z, 1.0..=1000.0, 1.0);

                ui.separator();
                ui.label("Influence");
                Self::labeled_drag_f32(
                    ui,
                    "min dist:",
                    &mut self.cfg.influence_min_dist,
                    0.1..=500.0,
                    0.5,
                );
                Self::labeled_drag_f32(
                    ui,
                    "max dist:",
                    &mut self.cfg.influence_max_dist,
                    0.1..=1000.0,
                    0.5,
                );

                ui.separator();
                ui.label("Growth");
                Self::labeled_drag_f32(ui, "branch length:", &mut self.cfg.branch_length, 0.1..=200.0, 0.5);
                Self::labeled_drag_f32(
                    ui,
                    "length scale:",
                    &mut self.cfg.branch_length_scale,
                    0.01..=1.0,
                    0.005,
                );
                Self::labeled_drag_f32(ui, "root width:", &mut self.cfg.root_width, 0.1..=100.0, 0.2);
                Self::labeled_drag_f32(
                    ui,
                    "width scale:",
                    &mut self.cfg.branch_width_scale,
                    0.01..=1.0,
                    0.005,
                );
                Self::labeled_drag_f32(
                    ui,
                    "previous dir:",
                    &mut self.cfg.previous_dir_power,
                    0.0..=10.0,
                    0.05,
                );
                Self::labeled_drag_usize(ui, "max nodes:", &mut self.cfg.max_nodes, 1..=20000, 1.0);

                ui.separator();
                ui.label("Mesh");
                Self::labeled_drag_usize(ui, "circle res:", &mut self.cfg.circle_res, 4..=32, 2.0);

                ui.separator();
                ui.checkbox(&mut self.show_frames, "Show frames");
                ui.checkbox(&mut self.show_attractors, "Show attraction points");

                ui.separator();
                if ui.button("Reset cfg to default").clicked() {
                    self.cfg = Config::default();
                }
            });
    }

    /// Builds the central panel where the tree is drawn.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            // Drag pans, shift-drag orbits.
            if response.dragged() {
                let delta = response.drag_delta();
                if ui.input(|i| i.modifiers.shift) {
                    self.yaw += delta.x * 0.01;
                    self.pitch = (self.pitch + delta.y * 0.01).clamp(-1.5, 1.5);
                } else {
                    self.pan += delta;
                }
            }

            // Zoom around the mouse cursor.
            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let pointer_screen = response.hover_pos().unwrap_or(rect.center());
                let view_before = self.screen_to_view(pointer_screen, rect);

                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(0.05, 10.0);

                let screen_after = self.view_to_screen(view_before, rect);
                self.pan += pointer_screen - screen_after;
            }

            // Branches, thicker near the root.
            for (parent, child) in self.tree.edges() {
                let a = self.world_to_screen(self.tree.nodes[parent].pos, rect);
                let b = self.world_to_screen(self.tree.nodes[child].pos, rect);
                let width = (self.tree.nodes[child].width * 2.0 * self.zoom).max(1.0);
                let color = if self.last_new_ids.contains(&child) {
                    egui::Color32::RED
                } else {
                    egui::Color32::from_rgb(150, 110, 70)
                };
                painter.line_segment([a, b], egui::Stroke::new(width, color));
            }

            if self.show_frames {
                for line in frame_lines(&self.tree, 10.0) {
                    let [r, g, b] = line.color.map(|c| (c * 255.0) as u8);
                    painter.line_segment(
                        [
                            self.world_to_screen(line.start, rect),
                            self.world_to_screen(line.end, rect),
                        ],
                        egui::Stroke::new(1.0, egui::Color32::from_rgb(r, g, b)),
                    );
                }
            }

            if self.show_attractors {
                for a in &self.tree.attractors.points {
                    let p = self.world_to_screen(a.pos, rect);
                    let color = if a.owner.is_some() {
                        egui::Color32::GOLD
                    } else {
                        egui::Color32::LIGHT_RED
                    };
                    painter.circle_filled(p, 2.0, color);
                }
            }

            // Auto-run growth if requested.
            if self.running {
                let now = ctx.input(|i| i.time);
                let elapsed = now - self.last_step_time;
                if elapsed >= self.step_interval {
                    if self.last_step_time > 0.0 {
                        self.last_step_dt = elapsed;
                    }
                    self.step_once();
                    self.last_step_time = now;
                }

                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}
