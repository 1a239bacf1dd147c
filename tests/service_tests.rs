use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use tempfile::{TempDir, tempdir};
use wallflow::{
    apply::LogOnlySetter,
    config::ConfigStore,
    control,
    displays::{AliasStore, LayoutFile},
    paths::AppPaths,
    schedule::Scheduler,
    service::Service,
};

struct Setup {
    tmp: TempDir,
    walls: PathBuf,
    paths: AppPaths,
    service: Arc<Service>,
}

fn save_solid(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(width, height, Rgb(rgb)).save(path).unwrap();
}

fn setup() -> Setup {
    let tmp = tempdir().unwrap();
    let walls = tmp.path().join("walls");
    let paths = AppPaths::new(tmp.path().join("data"));
    paths.ensure_data_dir().unwrap();
    fs::write(
        paths.config_file(),
        format!(
            r#"{{"wallpaperDir": {:?}, "changeInterval": 1, "shuffle": false}}"#,
            walls.display().to_string()
        ),
    )
    .unwrap();
    fs::write(
        paths.layout_file(),
        r#"[{"id":"DP-1","x":-4,"y":0,"width":4,"height":2},
            {"id":"DP-2","x":0,"y":0,"width":3,"height":3}]"#,
    )
    .unwrap();
    fs::write(paths.buffer_file(23456), b"left over").unwrap();

    save_solid(&walls.join("4x2").join("a.png"), 4, 2, [9, 9, 9]);
    save_solid(&walls.join("4x2").join("b.png"), 4, 2, [8, 8, 8]);
    save_solid(&walls.join("3x3").join("c.png"), 3, 3, [7, 7, 7]);

    let config = Arc::new(ConfigStore::open(paths.config_file()).unwrap());
    let aliases = Arc::new(AliasStore::open(paths.aliases_file()).unwrap());
    let source = LayoutFile::new(paths.layout_file(), aliases.clone());
    let service = Service::new(
        paths.clone(),
        config,
        Box::new(source),
        Arc::new(LogOnlySetter),
    )
    .with_aliases(aliases);
    service.startup().unwrap();

    Setup {
        tmp,
        walls,
        paths,
        service: Arc::new(service),
    }
}

#[test]
fn startup_sweeps_buffers_and_loads_layout() {
    let s = setup();
    assert!(!s.paths.buffer_file(23456).exists());

    let displays = s.service.displays();
    assert_eq!(displays.len(), 2);
    assert_eq!((displays[0].x, displays[1].x), (0, 4));
    assert_eq!(displays[0].alias, "4x2");
    assert_eq!(
        s.service.repository().files(4, 2).unwrap(),
        vec![s.walls.join("4x2").join("a.png"), s.walls.join("4x2").join("b.png")]
    );
}

#[test]
fn cycle_writes_the_spanning_bitmap() {
    let s = setup();
    let report = s.service.cycle_all().unwrap();
    assert_eq!((report.canvas.width, report.canvas.height), (7, 3));
    let bmp = image::open(s.paths.output_file()).unwrap().to_rgb8();
    assert_eq!(bmp.get_pixel(0, 0).0, [9, 9, 9]);
    assert_eq!(bmp.get_pixel(6, 2).0, [7, 7, 7]);
}

#[test]
fn control_session_drives_the_service() {
    let s = setup();
    let script = "\
next
next DP-1
alias DP-2 side
next side
shuffle
displays
bogus
quit
next
";
    let mut out = Vec::new();
    control::run(&s.service, script.as_bytes(), &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.contains("cycled 2 display(s)"));
    assert!(out.contains("cycled DP-1"));
    assert!(out.contains("cycled side"));
    assert!(out.contains("shuffle on"));
    assert!(out.contains("unknown command: bogus"));
    // Nothing after quit runs.
    assert_eq!(out.matches("cycled 2 display(s)").count(), 1);

    assert_eq!(
        s.service.compositor().current_wallpaper("DP-1"),
        Some(s.walls.join("4x2").join("b.png"))
    );
    assert!(s.service.config().shuffle);
    let aliases = fs::read_to_string(s.paths.aliases_file()).unwrap();
    assert!(aliases.contains("\"side\""));
}

#[test]
fn unknown_display_reports_an_error_and_continues() {
    let s = setup();
    let mut out = Vec::new();
    control::run(&s.service, "next HDMI-9\ndisplays\n".as_bytes(), &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("error:"));
    assert!(out.contains("DP-1"));
}

#[test]
fn changing_directory_repopulates_and_cycles() {
    let s = setup();
    let other = s.tmp.path().join("other");
    save_solid(&other.join("4x2").join("z.png"), 4, 2, [1, 2, 3]);

    s.service.set_wallpaper_dir(other.clone()).unwrap();
    assert_eq!(s.service.config().wallpaper_dir, other);
    assert_eq!(
        s.service.compositor().current_wallpaper("DP-1"),
        Some(other.join("4x2").join("z.png"))
    );
    // The 3x3 group is empty under the new root.
    assert_eq!(s.service.compositor().current_wallpaper("DP-2"), None);
    assert!(other.join("3x3").is_dir());
}

#[test]
fn layout_changes_are_detected() {
    let s = setup();
    s.service.cycle_all().unwrap();
    assert!(!s.service.refresh_displays().unwrap());

    fs::write(
        s.paths.layout_file(),
        r#"[{"id":"DP-1","x":0,"y":0,"width":4,"height":2}]"#,
    )
    .unwrap();
    assert!(s.service.refresh_displays().unwrap());
    assert_eq!(s.service.displays().len(), 1);
    let bmp = image::open(s.paths.output_file()).unwrap().to_rgb8();
    assert_eq!(bmp.dimensions(), (4, 2));
}

#[test]
fn scheduler_cycles_on_its_own() {
    let s = setup();
    let scheduler =
        Scheduler::spawn_with_tick(s.service.clone(), Duration::from_millis(50)).unwrap();
    std::thread::sleep(Duration::from_millis(1500));
    scheduler.stop();
    assert!(s.service.compositor().current_wallpaper("DP-1").is_some());
    assert!(s.paths.output_file().exists());
}

#[test]
fn shutdown_leaves_no_buffers() {
    let s = setup();
    s.service.cycle_all().unwrap();
    s.service.shutdown();
    let buffers = fs::read_dir(s.paths.data_dir())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "dat"))
        .count();
    assert_eq!(buffers, 0);
}
