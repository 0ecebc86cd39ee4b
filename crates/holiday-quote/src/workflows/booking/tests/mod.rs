mod common;
mod pricing;
mod routing;
