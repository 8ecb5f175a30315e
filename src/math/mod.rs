pub mod fixed;
pub mod tables;
pub mod trig;

pub use fixed::{FRACBITS, FRACUNIT, Fixed, approx_distance, fixed_div, fixed_mul};
pub use trig::{
    ANG45, ANG90, ANG180, ANG270, ANGLETOFINESHIFT, Angle, Angle16, BinaryAngle, FINEANGLES,
    cosine, point_to_angle, sine,
};
