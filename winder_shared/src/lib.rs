// winder_shared: types and traits shared by the host, the simulator and tests

pub mod config;
pub mod coordinate;
pub mod gcode;
pub mod protocol;
pub mod serial_interface;
pub mod wind;

pub use coordinate::{Axis, Coordinate, PartialCoordinate};
pub use serial_interface::{
    ChannelInterface, ChannelPeer, ChannelTransport, SerialInterface, SerialTransport,
    TransportError, channel_transport,
};
pub use wind::{
    HelicalLayer, HoopLayer, Layer, LayerKind, MandrelParameters, SkipLayer, TowParameters,
    WindDefinition,
};
