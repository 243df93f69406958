/// 渲染器 (Renderer)
/// 本地窗口: 显示标注后的画面和 HUD, 把键盘/鼠标转换成命令
use crate::pipeline::{DisplayFrame, MetricsSnapshot, TrackerCommand, TrackerContext, TrackerState};
use crate::tracking::PixelPoint;
use crossbeam_channel::Receiver;
use ::image::RgbImage;
use macroquad::prelude::*;
use std::time::Instant;
use tracing::info;

const HUD_FONT_SIZE: f32 = 24.0;
const HUD_LINE_HEIGHT: f32 = 30.0;

/// 画面在窗口中的位置与缩放 (保持宽高比, 居中留黑边)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub offset_x: f32,
    pub offset_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Viewport {
    pub fn fit(frame_size: (u32, u32), screen: (f32, f32)) -> Self {
        let (w, h) = (frame_size.0.max(1) as f32, frame_size.1.max(1) as f32);
        let scale = (screen.0 / w).min(screen.1 / h);
        Self {
            offset_x: (screen.0 - w * scale) / 2.0,
            offset_y: (screen.1 - h * scale) / 2.0,
            scale_x: scale,
            scale_y: scale,
        }
    }

    /// 窗口坐标 → 图像像素坐标; 画面外返回 `None`
    pub fn screen_to_image(&self, sx: f32, sy: f32, frame_size: (u32, u32)) -> Option<PixelPoint> {
        if self.scale_x <= 0.0 || self.scale_y <= 0.0 {
            return None;
        }
        let x = ((sx - self.offset_x) / self.scale_x).floor();
        let y = ((sy - self.offset_y) / self.scale_y).floor();
        if x < 0.0 || y < 0.0 || x >= frame_size.0 as f32 || y >= frame_size.1 as f32 {
            return None;
        }
        Some((x as i32, y as i32))
    }
}

/// 按键 → 命令 (取决于当前状态)
pub fn command_for_key(key: KeyCode, state: TrackerState) -> Option<TrackerCommand> {
    match (state, key) {
        (TrackerState::Calibrating, KeyCode::C) => Some(TrackerCommand::ConfirmCalibration),
        (TrackerState::Calibrating, KeyCode::Q | KeyCode::Escape) => {
            Some(TrackerCommand::CancelCalibration)
        }
        (TrackerState::Running, KeyCode::H) => Some(TrackerCommand::StartCalibration),
        (TrackerState::Running, KeyCode::R) => Some(TrackerCommand::ResetTrajectory),
        (TrackerState::Running | TrackerState::Initializing, KeyCode::Q | KeyCode::Escape) => {
            Some(TrackerCommand::Quit)
        }
        _ => None,
    }
}

/// HUD 文本行 (文字, 是否为高亮色)
pub fn hud_lines(snapshot: &MetricsSnapshot) -> Vec<(String, bool)> {
    let mut lines = Vec::with_capacity(6);
    if let Some(distance) = snapshot.distance {
        lines.push((format!("Distance: {:.2}m", distance), false));
    }
    lines.push((format!("FPS: {:.1}", snapshot.fps), true));
    lines.push((format!("Frame Latency: {:.1}ms", snapshot.frame_latency_ms), true));
    lines.push((format!("Detection Time: {:.1}ms", snapshot.detection_time_ms), true));
    lines.push((format!("Draw Time: {:.1}ms", snapshot.draw_time_ms), true));
    lines.push((format!("Positions: {}", snapshot.trajectory_length), false));
    if snapshot.current_speed > 0.0 || snapshot.max_speed > 0.0 {
        lines.push((
            format!(
                "Speed: {:.2} m/s (max {:.2})",
                snapshot.current_speed, snapshot.max_speed
            ),
            false,
        ));
    }
    lines
}

fn rgba_bytes(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((image.width() * image.height() * 4) as usize);
    for px in image.pixels() {
        bytes.extend_from_slice(&[px.0[0], px.0[1], px.0[2], 255]);
    }
    bytes
}

pub struct Renderer {
    frames: Receiver<DisplayFrame>,
    ctx: TrackerContext,
    texture: Option<Texture2D>,
    frame_size: (u32, u32),
    snapshot: Option<MetricsSnapshot>,
    pending_hoop: Option<PixelPoint>,

    // 统计
    render_count: u64,
    render_last: Instant,
    render_fps: f64,
}

impl Renderer {
    pub fn new(frames: Receiver<DisplayFrame>, ctx: TrackerContext) -> Self {
        info!("🎨 渲染器启动");
        Self {
            frames,
            ctx,
            texture: None,
            frame_size: (0, 0),
            snapshot: None,
            pending_hoop: None,
            render_count: 0,
            render_last: Instant::now(),
            render_fps: 0.0,
        }
    }

    /// 当前状态: 以最新发布的快照为准
    fn state(&self) -> TrackerState {
        self.ctx
            .latest()
            .map(|s| s.state)
            .or_else(|| self.snapshot.as_ref().map(|s| s.state))
            .unwrap_or(TrackerState::Initializing)
    }

    fn viewport(&self) -> Viewport {
        Viewport::fit(self.frame_size, (screen_width(), screen_height()))
    }

    /// 处理新帧和输入; 返回 false 表示窗口应当关闭
    pub fn update(&mut self) -> bool {
        // 只保留最新一帧，丢弃旧帧
        if let Some(frame) = self.frames.try_iter().last() {
            self.upload(&frame.image);
            self.pending_hoop = frame.pending_hoop;
            self.snapshot = Some(frame.snapshot);
        }

        self.render_count += 1;
        let elapsed = self.render_last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.render_fps = self.render_count as f64 / elapsed;
            self.render_count = 0;
            self.render_last = Instant::now();
        }

        self.handle_input()
    }

    fn upload(&mut self, image: &RgbImage) {
        let size = image.dimensions();
        let bytes = rgba_bytes(image);
        match &self.texture {
            // 只在分辨率变化时重建纹理
            Some(tex) if self.frame_size == size => {
                tex.update(&Image {
                    bytes,
                    width: size.0 as u16,
                    height: size.1 as u16,
                });
            }
            _ => {
                let texture = Texture2D::from_rgba8(size.0 as u16, size.1 as u16, &bytes);
                texture.set_filter(FilterMode::Linear);
                self.texture = Some(texture);
                self.frame_size = size;
            }
        }
    }

    fn handle_input(&mut self) -> bool {
        let state = self.state();
        let stopped = state == TrackerState::Stopped || !self.ctx.is_running();

        if is_quit_requested() {
            self.ctx.send(TrackerCommand::Quit);
            self.ctx.stop();
            return false;
        }

        if stopped {
            return !(is_key_pressed(KeyCode::Q) || is_key_pressed(KeyCode::Escape));
        }

        if state == TrackerState::Calibrating && is_mouse_button_pressed(MouseButton::Left) {
            let (mx, my) = mouse_position();
            if let Some((x, y)) = self.viewport().screen_to_image(mx, my, self.frame_size) {
                self.ctx.send(TrackerCommand::SetHoop { x, y });
            }
        }

        if let Some(key) = get_last_key_pressed() {
            if let Some(command) = command_for_key(key, state) {
                self.ctx.send(command);
            }
        }
        true
    }

    pub fn draw(&self) {
        clear_background(BLACK);
        let state = self.state();

        if let Some(texture) = &self.texture {
            let view = self.viewport();
            draw_texture_ex(
                texture,
                view.offset_x,
                view.offset_y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(
                        texture.width() * view.scale_x,
                        texture.height() * view.scale_y,
                    )),
                    ..Default::default()
                },
            );
        } else {
            draw_text("Waiting for camera...", 10.0, 30.0, HUD_FONT_SIZE, WHITE);
        }

        match state {
            TrackerState::Calibrating => {
                draw_text(
                    "Click on hoop center, then press 'C' to confirm ('Q' cancels)",
                    10.0,
                    30.0,
                    HUD_FONT_SIZE,
                    GREEN,
                );
                if let Some((x, y)) = self.pending_hoop {
                    let text = format!("Hoop: ({}, {})", x, y);
                    draw_text(&text, 10.0, 30.0 + HUD_LINE_HEIGHT, HUD_FONT_SIZE, YELLOW);
                }
            }
            _ => {
                if let Some(snapshot) = &self.snapshot {
                    for (i, (text, highlight)) in hud_lines(snapshot).iter().enumerate() {
                        let color = if *highlight { GREEN } else { WHITE };
                        let y = 30.0 + i as f32 * HUD_LINE_HEIGHT;
                        draw_text(text, 10.0, y, HUD_FONT_SIZE, color);
                    }
                }
                let help = if state == TrackerState::Stopped {
                    "Tracking stopped - Q: exit".to_string()
                } else {
                    format!("H: calibrate  R: reset  Q: quit  | render {:.0} fps", self.render_fps)
                };
                draw_text(&help, 10.0, screen_height() - 10.0, 20.0, WHITE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_maps_scaled_coordinates() {
        let view = Viewport::fit((640, 480), (1280.0, 960.0));
        assert_eq!(view.screen_to_image(0.0, 0.0, (640, 480)), Some((0, 0)));
        assert_eq!(view.screen_to_image(641.0, 481.0, (640, 480)), Some((320, 240)));
        assert_eq!(view.screen_to_image(1280.0, 10.0, (640, 480)), None);
        assert_eq!(view.screen_to_image(-1.0, 10.0, (640, 480)), None);
    }

    #[test]
    fn test_viewport_letterboxes_wide_window() {
        let view = Viewport::fit((640, 480), (1280.0, 480.0));
        assert_eq!(view.scale_x, 1.0);
        assert_eq!(view.scale_y, 1.0);
        assert_eq!(view.offset_x, 320.0);
        assert_eq!(view.offset_y, 0.0);

        assert_eq!(view.screen_to_image(320.0, 10.0, (640, 480)), Some((0, 10)));
        assert_eq!(view.screen_to_image(300.0, 10.0, (640, 480)), None);
        assert_eq!(view.screen_to_image(960.0, 10.0, (640, 480)), None);
    }

    #[test]
    fn test_viewport_letterboxes_tall_window() {
        let view = Viewport::fit((640, 480), (320.0, 480.0));
        assert_eq!(view.scale_x, 0.5);
        assert_eq!(view.offset_y, 120.0);
        assert_eq!(view.screen_to_image(160.0, 240.0, (640, 480)), Some((320, 240)));
        assert_eq!(view.screen_to_image(160.0, 100.0, (640, 480)), None);
    }

    #[test]
    fn test_keys_depend_on_state() {
        use TrackerState::*;
        assert_eq!(command_for_key(KeyCode::H, Running), Some(TrackerCommand::StartCalibration));
        assert_eq!(command_for_key(KeyCode::R, Running), Some(TrackerCommand::ResetTrajectory));
        assert_eq!(command_for_key(KeyCode::Q, Running), Some(TrackerCommand::Quit));
        assert_eq!(command_for_key(KeyCode::Escape, Running), Some(TrackerCommand::Quit));

        assert_eq!(command_for_key(KeyCode::C, Calibrating), Some(TrackerCommand::ConfirmCalibration));
        assert_eq!(command_for_key(KeyCode::Q, Calibrating), Some(TrackerCommand::CancelCalibration));
        assert_eq!(command_for_key(KeyCode::H, Calibrating), None);
        assert_eq!(command_for_key(KeyCode::C, Running), None);
    }

    #[test]
    fn test_rgba_conversion() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(1, 0, ::image::Rgb([1, 2, 3]));
        assert_eq!(rgba_bytes(&image), vec![0, 0, 0, 255, 1, 2, 3, 255]);
    }
}
