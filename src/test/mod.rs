mod simulator;
mod topology;
