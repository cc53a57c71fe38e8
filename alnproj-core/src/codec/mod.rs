//! Symmetric encoders and decoders shared by the writer and reader

pub mod colour;
pub mod filter;
pub mod matrix;

pub use colour::{
    decode_feature_colour, decode_user_colours, encode_feature_colour, encode_user_colours,
    find_user_colours, UserColourTable,
};
pub use filter::{decode_filter, encode_filter};
pub use matrix::{decode_matrix, encode_matrix};
