#![cfg(not(target_arch = "wasm32"))]

use resetario_dots::{DotsConfig, Painter, Rgba, Scene, SourceImage, Viewport};

#[derive(Default)]
struct Count {
    squares: usize,
}

impl Painter for Count {
    fn clear(&mut self, _width: f64, _height: f64) {
        self.squares = 0;
    }

    fn set_fill(&mut self, _color: Rgba) {}

    fn fill_square(&mut self, _x: f64, _y: f64, _size: f64) {
        self.squares += 1;
    }
}

#[test]
fn unloaded_300_square_grid() {
    let mut scene = Scene::with_seed(DotsConfig::default(), 11).unwrap();
    scene.resize(300.0, 300.0, 1.0);

    let grid = scene.grid();
    assert_eq!((grid.cols(), grid.rows()), (30, 30));
    assert_eq!(grid.len(), 900);
    assert!(grid.dots().iter().all(|d| d.size_factor == 0.0));
    assert!(!scene.image_loaded());
}

#[test]
fn black_image_saturates_every_dot() {
    let mut scene = Scene::with_seed(DotsConfig::default(), 11).unwrap();
    scene.resize(100.0, 100.0, 1.0);
    scene.set_image(SourceImage::solid(1, 1, [0, 0, 0, 255]).unwrap());

    let grid = scene.grid();
    assert_eq!((grid.cols(), grid.rows()), (10, 10));
    assert_eq!(grid.len(), 100);
    assert!(grid.dots().iter().all(|d| d.size_factor == 1.0));
    assert_eq!(scene.sampler().dimensions(), (100, 100));
}

#[test]
fn unchanged_geometry_skips_rebuild() {
    let mut scene = Scene::with_seed(DotsConfig::default(), 11).unwrap();
    scene.resize(300.0, 300.0, 1.0);
    let phases: Vec<f64> = scene.grid().dots().iter().map(|d| d.phase).collect();

    assert!(scene.observe(300.0, 300.0, 1.0).is_none());
    assert_eq!(scene.rebuild_count(), 1);
    let after: Vec<f64> = scene.grid().dots().iter().map(|d| d.phase).collect();
    assert_eq!(phases, after);
}

#[test]
fn seeded_scenes_are_reproducible() {
    let run = |seed| {
        let mut scene = Scene::with_seed(DotsConfig::default(), seed).unwrap();
        let mut painter = Count::default();
        let live = Viewport::new(200.0, 120.0, 2.0);
        for i in 0..300 {
            let t = i as f64 * 16.0;
            scene.frame(&mut painter, live, t, t);
        }
        (
            scene.glitches().glitches().to_vec(),
            scene.grid().dots().iter().map(|d| d.phase).collect::<Vec<_>>(),
        )
    };
    assert_eq!(run(3), run(3));
}

#[test]
fn loop_keeps_painting_without_an_image() {
    let mut scene = Scene::with_seed(DotsConfig::default(), 2).unwrap();
    let mut painter = Count::default();
    let live = Viewport::new(50.0, 40.0, 1.0);
    for i in 0..120 {
        let t = i as f64 * 16.0;
        scene.frame(&mut painter, live, t, t);
        assert!(painter.squares <= 20);
    }
    assert_eq!(scene.rebuild_count(), 1);
}
