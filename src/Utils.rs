//! different utility modules used throughout the project
/// logger initialisation and saving of the trajectory into a csv file
pub mod logger;
/// tiny module to plot result of IVP computation into PNG bytes
pub mod plots;
/// parse document with structure like "title1 \n key1: value1 \n title2 \n key2: value2" into HashMap
pub mod task_parser;
