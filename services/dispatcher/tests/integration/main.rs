
mod callback_test;
mod events_test;
mod sink_test;
