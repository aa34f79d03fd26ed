pub mod result_slots;
