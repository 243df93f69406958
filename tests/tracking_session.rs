//! 端到端: 图片目录 → 跟踪线程 → 快照

use basketball_tracker::input::build_source;
use basketball_tracker::pipeline::StopReason;
use basketball_tracker::{TrackerCommand, TrackerConfig, TrackerContext, TrackerState, TrackingLoop};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use std::path::Path;

fn write_frames(dir: &Path, centers: &[(i32, i32)]) {
    for (i, &center) in centers.iter().enumerate() {
        let mut frame = RgbImage::from_pixel(320, 240, Rgb([15, 15, 15]));
        draw_filled_circle_mut(&mut frame, center, 14, Rgb([0, 210, 0]));
        frame.save(dir.join(format!("frame_{:03}.png", i))).unwrap();
    }
}

fn sequence_config(dir: &Path) -> TrackerConfig {
    let mut config = TrackerConfig::default();
    config.source = dir.to_string_lossy().into_owned();
    config.camera.fps = 0;
    config.publish_interval = 1;
    config
}

#[test]
fn test_sequence_session_reports_distance() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), &[(60, 200), (90, 170), (120, 140), (150, 110)]);

    let mut config = sequence_config(dir.path());
    config.hoop = Some((150, 30));
    config.pixels_per_meter = Some(40.0);

    let source = build_source(&config).unwrap();
    let (ctx, rx) = TrackerContext::channel();
    let handle = TrackingLoop::new(config, &ctx, rx)
        .unwrap()
        .spawn(source)
        .unwrap();

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.reason, StopReason::SourceExhausted);
    assert_eq!(summary.frames, 4);
    assert!(summary.max_speed > 0.0);
    assert!(!ctx.is_running());

    let snap = ctx.latest().unwrap();
    assert_eq!(snap.state, TrackerState::Stopped);
    assert_eq!(snap.positions_tracked, 4);
    // (150,110) 到篮筐 80 像素 → 2 米
    let distance = snap.distance.unwrap();
    assert!((distance - 2.0).abs() < 0.05, "distance = {}", distance);

    let json = serde_json::to_value(&*snap).unwrap();
    assert_eq!(json["state"], "stopped");
    assert_eq!(json["hoop_position"], serde_json::json!([150, 30]));
}

#[test]
fn test_quit_command_stops_looping_session() {
    let dir = tempfile::tempdir().unwrap();
    write_frames(dir.path(), &[(100, 100), (110, 100)]);

    let mut config = sequence_config(dir.path());
    config.loop_source = true;
    config.camera.fps = 100;

    let source = build_source(&config).unwrap();
    let (ctx, rx) = TrackerContext::channel();
    let handle = TrackingLoop::new(config, &ctx, rx)
        .unwrap()
        .spawn(source)
        .unwrap();

    std::thread::sleep(std::time::Duration::from_millis(100));
    assert!(ctx.send(TrackerCommand::ResetTrajectory));
    assert!(ctx.send(TrackerCommand::Quit));

    let summary = handle.join().unwrap().unwrap();
    assert_eq!(summary.reason, StopReason::Requested);
    assert!(summary.frames > 0);
    assert_eq!(ctx.latest().unwrap().state, TrackerState::Stopped);
    // 线程退出后命令无处可去
    assert!(!ctx.send(TrackerCommand::Quit));
}

#[test]
fn test_missing_directory_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = sequence_config(&dir.path().join("missing"));

    let source = build_source(&config).unwrap();
    let (ctx, rx) = TrackerContext::channel();
    let result = TrackingLoop::new(config, &ctx, rx)
        .unwrap()
        .spawn(source)
        .unwrap()
        .join()
        .unwrap();

    assert!(result.is_err());
    assert!(!ctx.is_running());
    assert_eq!(ctx.latest().unwrap().state, TrackerState::Stopped);
}
