mod insert_taps;
mod scenario;
