pub mod component;
pub mod multinomial;
pub mod prior;

pub use component::ComponentModel;
pub use multinomial::Multinomial;
pub use prior::{PitmanYor, PoppePrior, ProcessPrior, UniformPrior};
