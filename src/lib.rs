mod animation;
mod charge;
mod error;
mod field;
mod frustum;
mod march;
mod ray;
mod renderer;
mod scene;

pub use {
    animation::Drift,
    charge::Charge,
    error::{RenderError, Result},
    field::{FieldSample, ScalarField},
    frustum::{Frustum, RayBuffer},
    march::{march, IterationStats, MarchHit, MarchStats, EPSILON, ISOVALUE, MAX_ITERATIONS, STEP_LIMIT},
    ray::Ray,
    renderer::{default_light_source, shade, FieldRenderer},
    scene::{Scene, SceneBuilder},
};
