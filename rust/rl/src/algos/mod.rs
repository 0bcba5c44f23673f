pub mod model_free;
