pub mod config;
pub mod info;
pub mod read;

use clap::ValueEnum;
use skyframe_core::Instrument;

#[derive(Clone, Copy, ValueEnum)]
pub enum InstrumentArg {
    Nir,
    Blueline,
    Spectrograph,
    Rgb,
}

impl From<InstrumentArg> for Instrument {
    fn from(arg: InstrumentArg) -> Self {
        match arg {
            InstrumentArg::Nir => Instrument::Nir,
            InstrumentArg::Blueline => Instrument::Blueline,
            InstrumentArg::Spectrograph => Instrument::Spectrograph,
            InstrumentArg::Rgb => Instrument::Rgb,
        }
    }
}
